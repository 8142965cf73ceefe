use std::{sync::Arc, time::Duration};

use drafthouse_api_types::BlogPost;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tracing::{debug, trace};

use super::{
    coordinator::DraftCoordinator,
    types::{Edit, EditorError, EditorStatus, Outcome},
};
use crate::application::debounce::Debouncer;
use crate::domain::{types::DraftId, uploads::ImageFile};

pub const DEFAULT_TITLE_DEBOUNCE: Duration = Duration::from_millis(1500);
pub const DEFAULT_CONTENT_DEBOUNCE: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub title_debounce: Duration,
    pub content_debounce: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            title_debounce: DEFAULT_TITLE_DEBOUNCE,
            content_debounce: DEFAULT_CONTENT_DEBOUNCE,
        }
    }
}

/// Live editing session: raw keystrokes in, debounced saves out.
///
/// A driver task feeds settled title and content values into the
/// coordinator and re-evaluates once a deferred auto-save becomes due.
pub struct EditorSession {
    coordinator: Arc<DraftCoordinator>,
    title: Debouncer<String>,
    content: Debouncer<String>,
    driver: JoinHandle<()>,
}

impl EditorSession {
    pub fn start(coordinator: Arc<DraftCoordinator>, timings: SessionTimings) -> Self {
        let (title, titles) = Debouncer::spawn(String::new(), timings.title_debounce);
        let (content, contents) = Debouncer::spawn(String::new(), timings.content_debounce);
        let driver = tokio::spawn(drive(Arc::clone(&coordinator), titles, contents));

        Self {
            coordinator,
            title,
            content,
            driver,
        }
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.title.push(title.into());
    }

    pub fn set_content(&self, content: impl Into<String>) {
        self.content.push(content.into());
    }

    pub fn status(&self) -> EditorStatus {
        self.coordinator.snapshot()
    }

    /// Load an existing post and seed the inputs with its fields.
    pub async fn load_existing(&self, id: DraftId) -> Result<(), EditorError> {
        self.coordinator.load_existing(id).await?;
        let document = self.coordinator.document();
        self.title.reset(document.title().to_string());
        self.content.reset(document.content().to_string());
        Ok(())
    }

    /// Publish the latest input, settled or not.
    pub async fn publish(&self) -> Result<BlogPost, EditorError> {
        self.coordinator.record(Edit::Title(self.title.latest()));
        self.coordinator.record(Edit::Content(self.content.latest()));

        let post = self.coordinator.publish().await?;
        self.title.reset(String::new());
        self.content.reset(String::new());
        Ok(post)
    }

    pub async fn upload_image(&self, file: ImageFile) -> Result<String, EditorError> {
        self.coordinator.upload_image(file).await
    }

    /// Reset the session and every endpoint breaker.
    pub fn reinitialize(&self) {
        self.coordinator.reinitialize();
        self.title.reset(String::new());
        self.content.reset(String::new());
    }

    /// Stop timers and ignore results of calls still in flight.
    pub fn close(&self) {
        self.title.cancel();
        self.content.cancel();
        self.driver.abort();
        self.coordinator.shutdown();
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn drive(
    coordinator: Arc<DraftCoordinator>,
    mut titles: mpsc::UnboundedReceiver<String>,
    mut contents: mpsc::UnboundedReceiver<String>,
) {
    let mut due: Option<Instant> = None;

    loop {
        let outcome = tokio::select! {
            Some(title) = titles.recv() => coordinator.apply(Edit::Title(title)).await,
            Some(content) = contents.recv() => coordinator.apply(Edit::Content(content)).await,
            () = wait_until(due), if due.is_some() => coordinator.evaluate().await,
            else => break,
        };
        trace!(?outcome, "Session evaluated");

        due = match outcome {
            Outcome::Deferred { until } => Some(until),
            _ => None,
        };
    }

    debug!("Session driver stopped");
}

async fn wait_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        sleep_until(deadline).await;
    }
}
