//! Remote blog service as seen by the editor.

use async_trait::async_trait;
use drafthouse_api_types::{BlogPost, BlogPostPayload, CreateDraftResponse, PresignedUpload};
use thiserror::Error;

use crate::domain::types::DraftId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("missing API key; set DRAFTHOUSE_API_KEY or --key-file")]
    MissingCredential,
    #[error("endpoint `{path}` not found; check the configured base URL")]
    NotFound { path: String },
    #[error("request was not authorized (status {status})")]
    Unauthorized { status: u16 },
    #[error("server rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

#[async_trait]
pub trait BlogApi: Send + Sync {
    /// Fails with [`ApiError::MissingCredential`] when no request could be
    /// authorized. Called before any request is attempted.
    fn ensure_credential(&self) -> Result<(), ApiError> {
        Ok(())
    }

    async fn create_draft(&self, title: &str) -> Result<CreateDraftResponse, ApiError>;

    async fn update_post(
        &self,
        id: &DraftId,
        payload: &BlogPostPayload,
    ) -> Result<BlogPost, ApiError>;

    async fn get_post(&self, id: &DraftId) -> Result<BlogPost, ApiError>;

    async fn presign_upload(&self, key: &str) -> Result<PresignedUpload, ApiError>;

    async fn upload_object(
        &self,
        presigned_url: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError>;
}
