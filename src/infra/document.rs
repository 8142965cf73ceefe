//! Local files as editor input.
//!
//! A document file holds the title on its first line as `# Title`; the rest
//! of the file is the content markup.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, warn};

use crate::domain::uploads::ImageFile;

use super::error::InfraError;

const TITLE_PREFIX: &str = "# ";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub title: String,
    pub content: String,
}

impl DocumentSnapshot {
    pub fn parse(text: &str) -> Self {
        let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
        match first.trim_end_matches('\r').strip_prefix(TITLE_PREFIX) {
            Some(title) => Self {
                title: title.trim().to_string(),
                content: rest.trim_start_matches(['\r', '\n']).to_string(),
            },
            None => Self {
                title: String::new(),
                content: text.to_string(),
            },
        }
    }
}

pub async fn read_document(path: &Path) -> Result<DocumentSnapshot, InfraError> {
    let text = tokio::fs::read_to_string(path).await.map_err(|err| {
        InfraError::configuration(format!("failed to read {}: {err}", path.display()))
    })?;
    Ok(DocumentSnapshot::parse(&text))
}

/// Poll `path` every `interval` and emit each distinct snapshot.
///
/// The first readable snapshot is always emitted. Read failures are logged
/// and retried on the next tick. The task ends once the receiver is dropped.
pub fn watch_document(
    path: PathBuf,
    interval: Duration,
) -> (JoinHandle<()>, mpsc::UnboundedReceiver<DocumentSnapshot>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<DocumentSnapshot> = None;

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            let snapshot = match read_document(&path).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "Document poll failed");
                    continue;
                }
            };
            if last.as_ref() == Some(&snapshot) {
                continue;
            }
            debug!(path = %path.display(), "Document changed");
            last = Some(snapshot.clone());
            if tx.send(snapshot).is_err() {
                break;
            }
        }
    });
    (task, rx)
}

pub async fn read_image(path: &Path) -> Result<ImageFile, InfraError> {
    let bytes = tokio::fs::read(path).await?;
    let content_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok(ImageFile {
        file_name: path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string),
        content_type,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_line_is_split_from_content() {
        let doc = DocumentSnapshot::parse("# Hello world \n\n<p>Body</p>\n");
        assert_eq!(doc.title, "Hello world");
        assert_eq!(doc.content, "<p>Body</p>\n");
    }

    #[test]
    fn missing_title_line_keeps_everything_as_content() {
        let doc = DocumentSnapshot::parse("<p>Body only</p>");
        assert_eq!(doc.title, "");
        assert_eq!(doc.content, "<p>Body only</p>");
    }

    #[test]
    fn title_only_file_has_empty_content() {
        let doc = DocumentSnapshot::parse("# Just a title");
        assert_eq!(doc.title, "Just a title");
        assert_eq!(doc.content, "");
    }

    #[tokio::test]
    async fn images_carry_guessed_content_type() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("photo.PNG");
        tokio::fs::write(&path, [0_u8; 16]).await.expect("write image");

        let image = read_image(&path).await.expect("read image");
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.file_name.as_deref(), Some("photo.PNG"));
        assert_eq!(image.size(), 16);
    }

    #[tokio::test]
    async fn watcher_emits_only_changes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("post.md");
        tokio::fs::write(&path, "# First\n").await.expect("write");

        let (task, mut rx) = watch_document(path.clone(), Duration::from_millis(10));
        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("first snapshot in time")
            .expect("watcher alive");
        assert_eq!(first.title, "First");

        tokio::fs::write(&path, "# Second\n<p>x</p>")
            .await
            .expect("rewrite");
        let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("second snapshot in time")
            .expect("watcher alive");
        assert_eq!(second.title, "Second");
        assert_eq!(second.content, "<p>x</p>");

        drop(rx);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("watcher stops")
            .expect("watcher task");
    }
}
