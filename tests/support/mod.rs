#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use drafthouse::application::{
    api::{ApiError, BlogApi},
    breaker::{BreakerPolicy, CircuitBreaker},
    clock::{Clock, TokioClock},
    editor::{AutosavePolicy, DraftCoordinator},
    notices::{ChannelNotices, Notice},
};
use drafthouse::domain::types::DraftId;
use drafthouse_api_types::{BlogPost, BlogPostPayload, CreateDraftResponse, PresignedUpload};
use tokio::sync::mpsc::UnboundedReceiver;

pub const DRAFT_ID: &str = "draft-1";

/// In-memory blog API with scripted failures and call counters.
#[derive(Default)]
pub struct FakeBlogApi {
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
    pub gets: AtomicUsize,
    pub uploads: AtomicUsize,
    pub created_titles: Mutex<Vec<String>>,
    pub payloads: Mutex<Vec<(DraftId, BlogPostPayload)>>,
    pub presigned_keys: Mutex<Vec<String>>,
    create_failures: Mutex<VecDeque<ApiError>>,
    update_failures: Mutex<VecDeque<ApiError>>,
    stored: Mutex<Option<BlogPost>>,
    latency: Mutex<Duration>,
    missing_credential: AtomicBool,
}

impl FakeBlogApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_creates(&self, count: usize, err: ApiError) {
        let mut failures = self.create_failures.lock().expect("create failures");
        failures.extend(std::iter::repeat_n(err, count));
    }

    pub fn fail_updates(&self, count: usize, err: ApiError) {
        let mut failures = self.update_failures.lock().expect("update failures");
        failures.extend(std::iter::repeat_n(err, count));
    }

    pub fn store(&self, post: BlogPost) {
        *self.stored.lock().expect("stored post") = Some(post);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().expect("latency") = latency;
    }

    pub fn revoke_credential(&self) {
        self.missing_credential.store(true, Ordering::SeqCst);
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<(DraftId, BlogPostPayload)> {
        self.payloads.lock().expect("payloads").clone()
    }

    async fn delay(&self) {
        let latency = *self.latency.lock().expect("latency");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl BlogApi for FakeBlogApi {
    fn ensure_credential(&self) -> Result<(), ApiError> {
        if self.missing_credential.load(Ordering::SeqCst) {
            Err(ApiError::MissingCredential)
        } else {
            Ok(())
        }
    }

    async fn create_draft(&self, title: &str) -> Result<CreateDraftResponse, ApiError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if let Some(err) = self.create_failures.lock().expect("create failures").pop_front() {
            return Err(err);
        }
        self.created_titles
            .lock()
            .expect("created titles")
            .push(title.to_string());
        Ok(CreateDraftResponse {
            id: DRAFT_ID.to_string(),
            message: Some("Draft created".to_string()),
        })
    }

    async fn update_post(
        &self,
        id: &DraftId,
        payload: &BlogPostPayload,
    ) -> Result<BlogPost, ApiError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        if let Some(err) = self.update_failures.lock().expect("update failures").pop_front() {
            return Err(err);
        }
        self.payloads
            .lock()
            .expect("payloads")
            .push((id.clone(), payload.clone()));
        Ok(post(id.as_str(), &payload.title, &payload.content))
    }

    async fn get_post(&self, id: &DraftId) -> Result<BlogPost, ApiError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.stored
            .lock()
            .expect("stored post")
            .clone()
            .filter(|post| post.id == id.as_str())
            .ok_or_else(|| ApiError::NotFound {
                path: format!("/blogs/{id}"),
            })
    }

    async fn presign_upload(&self, key: &str) -> Result<PresignedUpload, ApiError> {
        self.presigned_keys
            .lock()
            .expect("presigned keys")
            .push(key.to_string());
        Ok(PresignedUpload {
            presigned_url: format!("https://bucket.s3.amazonaws.com/{key}?X-Amz-Signature=abc"),
            public_url: format!("https://bucket.s3.amazonaws.com/{key}"),
            file_name: Some(key.to_string()),
        })
    }

    async fn upload_object(
        &self,
        _presigned_url: &str,
        _content_type: &str,
        _bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn post(id: &str, title: &str, content: &str) -> BlogPost {
    BlogPost {
        id: id.to_string(),
        title: title.to_string(),
        content: content.to_string(),
        status: Some("draft".to_string()),
        images: Vec::new(),
        tags: Vec::new(),
        reading_time: None,
        author: None,
        created_at: None,
        updated_at: None,
        published_at: None,
    }
}

pub fn server_error() -> ApiError {
    ApiError::Rejected {
        status: 500,
        message: "Internal server error".to_string(),
    }
}

pub struct Harness {
    pub api: Arc<FakeBlogApi>,
    pub coordinator: Arc<DraftCoordinator>,
    pub notices: UnboundedReceiver<Notice>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(AutosavePolicy::default())
    }

    pub fn with_policy(policy: AutosavePolicy) -> Self {
        let api = FakeBlogApi::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let breaker = CircuitBreaker::new(BreakerPolicy::default(), Arc::clone(&clock));
        let (sink, notices) = ChannelNotices::new();
        let coordinator = DraftCoordinator::new(
            Arc::clone(&api) as Arc<dyn BlogApi>,
            breaker,
            clock,
            Arc::new(sink),
            policy,
        );
        Self {
            api,
            coordinator: Arc::new(coordinator),
            notices,
        }
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut seen = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            seen.push(notice);
        }
        seen
    }
}
