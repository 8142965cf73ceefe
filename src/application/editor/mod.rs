//! Draft/publish coordination for one editing session.

mod coordinator;
mod session;
pub mod types;

pub use coordinator::DraftCoordinator;
pub(crate) use coordinator::{METRIC_DRAFT_SAVE_MS, METRIC_DRAFT_SAVES};
pub use session::{DEFAULT_CONTENT_DEBOUNCE, DEFAULT_TITLE_DEBOUNCE, EditorSession, SessionTimings};
pub use types::{
    AutosavePolicy, CREATE_DRAFT_KEY, Edit, EditorError, EditorStatus, Outcome, PUBLISH_BLOG_KEY,
    UPDATE_BLOG_KEY,
};
