//! Domain layer types and invariants.

pub mod draft;
pub mod error;
pub mod images;
pub mod types;
pub mod uploads;
