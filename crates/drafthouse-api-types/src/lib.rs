//! Wire types shared between the drafthouse client and the blog API.
//!
//! The blog API speaks snake_case JSON for posts and camelCase for the
//! presigned-upload endpoint; the serde attributes below mirror that.

use serde::{Deserialize, Serialize};

/// Publication status carried by post payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
        }
    }
}

/// Body of `POST /blogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDraftRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: PostStatus,
}

/// Response of `POST /blogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDraftResponse {
    pub id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of `PUT /blogs?id=<id>`; used for both auto-save and publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPostPayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub status: PostStatus,
}

/// A stored post as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub reading_time: Option<u32>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
}

/// Response of `GET /get-presigned-url?fileName=<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    pub presigned_url: String,
    pub public_url: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Error body; the API uses either `message` or `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}
