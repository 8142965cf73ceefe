//! Editing session services: breaker, debounce, coordination.

pub mod api;
pub mod breaker;
pub mod clock;
pub mod debounce;
pub mod editor;
pub mod error;
pub(crate) mod lock;
pub mod notices;
pub mod uploads;
