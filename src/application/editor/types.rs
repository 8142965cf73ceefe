use std::{num::NonZeroU32, time::Duration};

use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::application::{api::ApiError, uploads::UploadError};
use crate::domain::{
    error::DomainError,
    types::{DraftId, EditorState},
};

pub const CREATE_DRAFT_KEY: &str = "create-draft";
pub const UPDATE_BLOG_KEY: &str = "update-blog";
pub const PUBLISH_BLOG_KEY: &str = "publish-blog";

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_SESSION_MAX_FAILURES: u32 = 5;
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("enter a title before publishing")]
    MissingTitle,
    #[error("enter a title first so a draft exists")]
    MissingDraft,
    #[error("another save or publish is already in progress")]
    Busy,
    #[error(
        "`{key}` is blocked after repeated failures ({failures}/{max_failures}); reload or wait for the cooldown"
    )]
    Blocked {
        key: String,
        failures: u32,
        max_failures: u32,
    },
    #[error("editing session is closed")]
    Closed,
    #[error(transparent)]
    MissingCredential(ApiError),
    #[error("publishing failed: {0}")]
    PublishFailed(#[source] ApiError),
    #[error("loading the post failed: {0}")]
    LoadFailed(#[source] ApiError),
    #[error("loading the post timed out after {}s", .0.as_secs())]
    LoadTimedOut(Duration),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Timing and threshold knobs for automatic background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosavePolicy {
    /// Auto-save runs only once strictly more than this passed since the last save.
    pub min_interval: Duration,
    /// Consecutive automatic failures before the session stops trying.
    pub max_failures: NonZeroU32,
    pub load_timeout: Duration,
}

impl Default for AutosavePolicy {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_AUTOSAVE_INTERVAL,
            max_failures: NonZeroU32::new(DEFAULT_SESSION_MAX_FAILURES)
                .unwrap_or(NonZeroU32::MIN),
            load_timeout: DEFAULT_LOAD_TIMEOUT,
        }
    }
}

/// A settled change coming from the author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Title(String),
    Content(String),
}

/// What one evaluation of the session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do right now.
    Skipped,
    DraftCreated,
    Saved,
    /// Too soon after the last save; evaluate again at `until`.
    Deferred { until: Instant },
    /// The attempt failed and was counted.
    Failed,
    /// The local tally or the endpoint breaker refuses automatic work.
    Blocked,
    /// No API key is available; nothing was sent.
    MissingCredential,
}

/// Session-local count of consecutive automatic failures.
///
/// Separate from the endpoint breaker: it never expires on its own and only
/// clears on success, publish or reinitialisation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FailureTally {
    count: u32,
    max: NonZeroU32,
}

impl FailureTally {
    pub(crate) fn new(max: NonZeroU32) -> Self {
        Self { count: 0, max }
    }

    /// Returns whether the tally is now blocked.
    pub(crate) fn record_failure(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.is_blocked()
    }

    pub(crate) fn reset(&mut self) {
        self.count = 0;
    }

    pub(crate) fn is_blocked(&self) -> bool {
        self.count >= self.max.get()
    }

    pub(crate) fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn max(&self) -> u32 {
        self.max.get()
    }
}

/// Internal phase; several map onto the same reported [`EditorState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Loading,
    CreatingDraft,
    Saving,
    Publishing,
    Saved,
}

impl Phase {
    pub(crate) fn in_flight(self) -> bool {
        matches!(
            self,
            Phase::Loading | Phase::CreatingDraft | Phase::Saving | Phase::Publishing
        )
    }
}

/// Point-in-time view of a session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorStatus {
    pub state: EditorState,
    pub draft_id: Option<DraftId>,
    pub title: String,
    pub last_saved_at: Option<OffsetDateTime>,
    pub failure_count: u32,
    pub loading: bool,
    pub publishing: bool,
}
