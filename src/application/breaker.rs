//! Per-endpoint circuit breaker.
//!
//! Each endpoint key tracks consecutive failures. Once the count reaches the
//! policy threshold the key is blocked: [`CircuitBreaker::wrap`] rejects calls
//! locally until the cooldown has passed since the last failure. Expiry is
//! lazy; there is no background timer.

use std::{fmt, future::Future, num::NonZeroU32, sync::Arc, time::Duration};

use dashmap::DashMap;
use metrics::counter;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::clock::Clock;

pub const DEFAULT_MAX_FAILURES: u32 = 5;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

pub(crate) const METRIC_BREAKER_OPENED: &str = "drafthouse_breaker_opened_total";
pub(crate) const METRIC_BREAKER_REJECTED: &str = "drafthouse_breaker_rejected_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    pub max_failures: NonZeroU32,
    pub cooldown: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            max_failures: NonZeroU32::new(DEFAULT_MAX_FAILURES).unwrap_or(NonZeroU32::MIN),
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryState {
    failure_count: u32,
    is_blocked: bool,
    last_failure_at: Instant,
}

impl RetryState {
    fn fresh(now: Instant) -> Self {
        Self {
            failure_count: 0,
            is_blocked: false,
            last_failure_at: now,
        }
    }
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error(
        "endpoint `{key}` is temporarily blocked due to repeated failures ({failures}/{max_failures}); reload or wait for the cooldown"
    )]
    Open {
        key: String,
        failures: u32,
        max_failures: u32,
    },
    #[error(transparent)]
    Inner(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }
}

/// Shared failure registry keyed by logical endpoint name.
///
/// Cloning yields another handle onto the same registry. Updates to one key
/// are serialized by the map's shard lock, so no increment is lost under
/// concurrent failures.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    policy: BreakerPolicy,
    clock: Arc<dyn Clock>,
    states: Arc<DashMap<String, RetryState>>,
}

impl CircuitBreaker {
    pub fn new(policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            states: Arc::new(DashMap::new()),
        }
    }

    pub fn policy(&self) -> BreakerPolicy {
        self.policy
    }

    pub fn is_blocked(&self, key: &str) -> bool {
        let now = self.clock.monotonic_now();
        let Some(state) = self.states.get(key).map(|entry| *entry) else {
            return false;
        };
        if !self.has_expired(&state, now) {
            return state.is_blocked;
        }

        self.states
            .remove_if(key, |_, current| self.has_expired(current, now));
        debug!(endpoint = key, "Breaker state expired after cooldown");
        false
    }

    pub fn record_success(&self, key: &str) {
        self.states.remove(key);
    }

    /// Count a failure against `key`; returns whether the key is now blocked.
    pub fn record_failure(&self, key: &str) -> bool {
        let now = self.clock.monotonic_now();
        let max = self.policy.max_failures.get();

        let (blocked, failures, newly_blocked) = {
            let mut entry = self
                .states
                .entry(key.to_string())
                .or_insert_with(|| RetryState::fresh(now));
            if self.has_expired(&entry, now) {
                *entry = RetryState::fresh(now);
            }
            entry.failure_count = entry.failure_count.saturating_add(1);
            entry.last_failure_at = now;
            let newly_blocked = !entry.is_blocked && entry.failure_count >= max;
            if entry.failure_count >= max {
                entry.is_blocked = true;
            }
            (entry.is_blocked, entry.failure_count, newly_blocked)
        };

        if newly_blocked {
            warn!(
                endpoint = key,
                failures,
                max_failures = max,
                cooldown_secs = self.policy.cooldown.as_secs(),
                "Endpoint blocked after repeated failures"
            );
            counter!(METRIC_BREAKER_OPENED, "endpoint" => key.to_string()).increment(1);
        }
        blocked
    }

    pub fn failure_count(&self, key: &str) -> u32 {
        let now = self.clock.monotonic_now();
        self.states
            .get(key)
            .filter(|state| !self.has_expired(state, now))
            .map_or(0, |state| state.failure_count)
    }

    pub fn reset(&self, key: &str) {
        self.states.remove(key);
    }

    pub fn reset_all(&self) {
        self.states.clear();
    }

    /// Keys currently rejecting calls, sorted.
    pub fn blocked_keys(&self) -> Vec<String> {
        let now = self.clock.monotonic_now();
        let mut keys: Vec<String> = self
            .states
            .iter()
            .filter(|entry| entry.is_blocked && !self.has_expired(entry.value(), now))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Run `operation` unless `key` is blocked, recording its outcome.
    ///
    /// A blocked key fails with [`BreakerError::Open`] without invoking the
    /// operation. Operation errors are returned unchanged inside
    /// [`BreakerError::Inner`] after bookkeeping.
    pub async fn wrap<T, E, F, Fut>(&self, key: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let max_failures = self.policy.max_failures.get();
        if self.is_blocked(key) {
            let failures = self.failure_count(key);
            counter!(METRIC_BREAKER_REJECTED, "endpoint" => key.to_string()).increment(1);
            debug!(endpoint = key, failures, max_failures, "Call rejected by open breaker");
            return Err(BreakerError::Open {
                key: key.to_string(),
                failures,
                max_failures,
            });
        }

        match operation().await {
            Ok(value) => {
                self.record_success(key);
                Ok(value)
            }
            Err(err) => {
                let blocked = self.record_failure(key);
                let failures = self.failure_count(key);
                warn!(
                    endpoint = key,
                    failures,
                    max_failures,
                    blocked,
                    error = %err,
                    "Endpoint call failed"
                );
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn has_expired(&self, state: &RetryState, now: Instant) -> bool {
        now.saturating_duration_since(state.last_failure_at) >= self.policy.cooldown
    }
}
