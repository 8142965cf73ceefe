//! Rules for images attached to a draft.

use super::{error::DomainError, types::DraftId};

/// Largest image accepted for upload.
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

const FALLBACK_EXTENSION: &str = "jpg";

/// An image read from disk, ready for upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn validate(&self, max_bytes: u64) -> Result<(), DomainError> {
        if !self.content_type.starts_with("image/") {
            return Err(DomainError::validation(
                "please select a valid image file (JPEG, PNG, GIF, WebP)",
            ));
        }
        if self.size() > max_bytes {
            return Err(DomainError::validation(format!(
                "image size must be at most {} MiB; compress the image and try again",
                max_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }

    pub fn extension(&self) -> String {
        match self.content_type.as_str() {
            "image/png" => "png".to_string(),
            "image/gif" => "gif".to_string(),
            "image/webp" => "webp".to_string(),
            _ => self
                .file_name
                .as_deref()
                .and_then(|name| name.rsplit_once('.'))
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .unwrap_or_else(|| FALLBACK_EXTENSION.to_string()),
        }
    }
}

/// Object key for the `index`-th image of a draft.
pub fn image_object_key(draft: &DraftId, index: u32, extension: &str) -> String {
    format!("posts/{draft}/image_{index}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: Option<&str>, content_type: &str, len: usize) -> ImageFile {
        ImageFile {
            file_name: name.map(str::to_string),
            content_type: content_type.to_string(),
            bytes: vec![0; len],
        }
    }

    #[test]
    fn non_images_are_rejected() {
        let file = image(Some("notes.txt"), "text/plain", 10);
        assert!(file.validate(DEFAULT_MAX_IMAGE_BYTES).is_err());
    }

    #[test]
    fn oversized_images_are_rejected() {
        let file = image(Some("big.png"), "image/png", 2048);
        assert!(file.validate(1024).is_err());
        assert!(file.validate(4096).is_ok());
    }

    #[test]
    fn extension_prefers_content_type_then_name() {
        assert_eq!(image(Some("a.jpeg"), "image/png", 1).extension(), "png");
        assert_eq!(image(Some("photo.JPEG"), "image/jpeg", 1).extension(), "jpeg");
        assert_eq!(image(None, "image/jpeg", 1).extension(), "jpg");
        assert_eq!(image(Some("noext"), "image/bmp", 1).extension(), "jpg");
    }

    #[test]
    fn object_keys_are_scoped_to_the_draft() {
        assert_eq!(
            image_object_key(&DraftId::from("d1"), 3, "webp"),
            "posts/d1/image_3.webp"
        );
    }
}
