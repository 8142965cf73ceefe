use std::error::Error as StdError;

use thiserror::Error;

use crate::{
    application::{api::ApiError, editor::EditorError, uploads::UploadError},
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Flattened error chain for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub source: &'static str,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            let message = inner.to_string();
            if !messages.last().is_some_and(|last| last.ends_with(&message)) {
                messages.push(message);
            }
            current = inner.source();
        }
        Self { source, messages }
    }

    pub fn chain(&self) -> String {
        self.messages.join(": ")
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Short label for the failing layer.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Domain(_) | AppError::Validation(_) => "invalid input",
            AppError::Infra(InfraError::Configuration { .. }) => "misconfigured",
            AppError::Infra(_) => "local failure",
            AppError::Editor(_) => "editor",
            AppError::Upload(_) => "upload",
            AppError::Api(ApiError::MissingCredential) => "missing credential",
            AppError::Api(_) => "blog api",
            AppError::Unexpected(_) => "unexpected",
        }
    }
}
