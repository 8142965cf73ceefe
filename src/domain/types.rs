//! Shared domain enumerations and identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(String);

impl DraftId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DraftId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for DraftId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Persistence status of a draft document as seen by the author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Unsaved,
    Saving,
    Saved,
    Blocked,
}

impl SaveStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SaveStatus::Unsaved => "unsaved",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Blocked => "blocked",
        }
    }
}

/// Externally visible state of the draft/publish coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EditorState {
    #[default]
    Idle,
    CreatingDraft,
    Saving,
    Saved,
    Blocked,
}

impl EditorState {
    pub fn as_str(self) -> &'static str {
        match self {
            EditorState::Idle => "idle",
            EditorState::CreatingDraft => "creating-draft",
            EditorState::Saving => "saving",
            EditorState::Saved => "saved",
            EditorState::Blocked => "blocked",
        }
    }
}

impl fmt::Display for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editor_state_serializes_kebab_case() {
        let value = serde_json::to_value(EditorState::CreatingDraft).expect("serialize");
        assert_eq!(value, "creating-draft");
        assert_eq!(EditorState::CreatingDraft.to_string(), "creating-draft");
    }

    #[test]
    fn draft_id_is_transparent() {
        let id = DraftId::from("d1");
        assert_eq!(serde_json::to_value(&id).expect("serialize"), "d1");
        assert_eq!(id.as_str(), "d1");
    }
}
