use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::application::api::{ApiError, BlogApi};
use crate::domain::{
    error::DomainError,
    types::DraftId,
    uploads::{ImageFile, image_object_key},
};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("presigned upload response is missing a URL")]
    IncompletePresign,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Pushes images to object storage through presigned URLs.
#[derive(Clone)]
pub struct ImageUploader {
    api: Arc<dyn BlogApi>,
    max_bytes: u64,
}

impl ImageUploader {
    pub fn new(api: Arc<dyn BlogApi>, max_bytes: u64) -> Self {
        Self { api, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Upload `file` as the `index`-th image of `draft`; returns its public URL.
    #[instrument(skip(self, file), fields(draft = %draft, size = file.size()))]
    pub async fn upload(
        &self,
        draft: &DraftId,
        index: u32,
        file: ImageFile,
    ) -> Result<String, UploadError> {
        file.validate(self.max_bytes)?;
        self.api.ensure_credential()?;

        let key = image_object_key(draft, index, &file.extension());
        let presigned = self.api.presign_upload(&key).await?;
        if presigned.presigned_url.trim().is_empty() || presigned.public_url.trim().is_empty() {
            return Err(UploadError::IncompletePresign);
        }

        self.api
            .upload_object(&presigned.presigned_url, &file.content_type, file.bytes)
            .await?;

        info!(key = %key, public_url = %presigned.public_url, "Image uploaded");
        Ok(presigned.public_url)
    }
}
