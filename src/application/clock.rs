//! Time sources.
//!
//! Everything time-dependent in the editor (debounce, auto-save interval,
//! breaker cooldown) reads time through [`Clock`], so tests control it.

use std::{fmt, sync::Mutex, time::Duration};

use time::OffsetDateTime;
use tokio::time::Instant;

use super::lock::mutex_lock;

pub trait Clock: Send + Sync + fmt::Debug {
    /// Monotonic instant for elapsed, interval and cooldown comparisons.
    fn monotonic_now(&self) -> Instant;

    /// Wall-clock timestamp shown to the author.
    fn wall_now(&self) -> OffsetDateTime;
}

/// Production clock backed by the Tokio timer.
///
/// Wall time is derived from the monotonic reading so that paused Tokio time
/// moves both in step.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor: Instant,
    anchor_wall: OffsetDateTime,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            anchor_wall: OffsetDateTime::now_utc(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }

    fn wall_now(&self) -> OffsetDateTime {
        self.anchor_wall + Instant::now().saturating_duration_since(self.anchor)
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    origin_wall: OffsetDateTime,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            origin_wall: OffsetDateTime::UNIX_EPOCH,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = mutex_lock(&self.offset, "application::clock", "advance");
        *offset += by;
    }

    fn offset(&self) -> Duration {
        *mutex_lock(&self.offset, "application::clock", "offset")
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn monotonic_now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn wall_now(&self) -> OffsetDateTime {
        self.origin_wall + self.offset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_on_advance() {
        let clock = ManualClock::new();
        let start = clock.monotonic_now();
        assert_eq!(clock.monotonic_now(), start);

        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.monotonic_now() - start, Duration::from_secs(30));
        assert_eq!(
            clock.wall_now(),
            OffsetDateTime::UNIX_EPOCH + Duration::from_secs(30)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        let wall = clock.wall_now();
        let mono = clock.monotonic_now();

        tokio::time::advance(Duration::from_secs(10)).await;

        assert_eq!(clock.monotonic_now() - mono, Duration::from_secs(10));
        assert_eq!(clock.wall_now() - wall, time::Duration::seconds(10));
    }
}
