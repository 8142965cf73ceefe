//! The document being edited in a drafting session.

use drafthouse_api_types::{BlogPostPayload, PostStatus};
use time::OffsetDateTime;

use super::{
    error::DomainError,
    images::image_keys,
    types::{DraftId, SaveStatus},
};

/// Titles longer than this are cut on input.
pub const MAX_TITLE_CHARS: usize = 100;

/// Content sent in place of an empty document.
pub const EMPTY_CONTENT: &str = "<p></p>";

/// Draft state owned by one editing session.
///
/// The server id is assigned once; a second assignment is an invariant
/// violation rather than a silent overwrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftDocument {
    id: Option<DraftId>,
    title: String,
    content: String,
    status: SaveStatus,
    last_saved_at: Option<OffsetDateTime>,
}

impl DraftDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<&DraftId> {
        self.id.as_ref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn last_saved_at(&self) -> Option<OffsetDateTime> {
        self.last_saved_at
    }

    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    pub fn assign_id(&mut self, id: DraftId) -> Result<(), DomainError> {
        if let Some(existing) = &self.id {
            return Err(DomainError::invariant(format!(
                "draft already has id `{existing}`; refusing to rebind to `{id}`"
            )));
        }
        self.id = Some(id);
        Ok(())
    }

    /// Returns whether the stored title changed.
    pub fn set_title(&mut self, title: &str) -> bool {
        let clamped = clamp_title(title);
        if clamped == self.title {
            return false;
        }
        self.title = clamped;
        true
    }

    /// Returns whether the stored content changed.
    pub fn set_content(&mut self, content: &str) -> bool {
        if content == self.content {
            return false;
        }
        self.content = content.to_string();
        true
    }

    pub fn set_status(&mut self, status: SaveStatus) {
        self.status = status;
    }

    pub fn mark_saved(&mut self, at: OffsetDateTime) {
        self.status = SaveStatus::Saved;
        self.last_saved_at = Some(at);
    }

    /// Build the update body for this document.
    pub fn payload(&self, status: PostStatus) -> Result<BlogPostPayload, DomainError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("title is required"));
        }

        let content = if self.content.trim().is_empty() {
            EMPTY_CONTENT.to_string()
        } else {
            self.content.clone()
        };
        let images = image_keys(&content)?;

        Ok(BlogPostPayload {
            title: title.to_string(),
            content,
            images,
            status,
        })
    }
}

pub fn clamp_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}
