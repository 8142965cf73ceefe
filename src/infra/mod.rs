//! Infrastructure adapters and runtime bootstrap.

pub mod blog_api;
pub mod credentials;
pub mod document;
pub mod error;
pub mod telemetry;
