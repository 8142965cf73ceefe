use std::{
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use drafthouse_api_types::{BlogPost, BlogPostPayload, PostStatus};
use metrics::{counter, histogram};
use tokio::{sync::Notify, time::Instant};
use tracing::{debug, error, info, instrument, warn};

use super::types::{
    AutosavePolicy, CREATE_DRAFT_KEY, Edit, EditorError, EditorStatus, FailureTally, Outcome,
    PUBLISH_BLOG_KEY, Phase, UPDATE_BLOG_KEY,
};
use crate::application::{
    api::{ApiError, BlogApi},
    breaker::{BreakerError, CircuitBreaker},
    clock::Clock,
    lock::mutex_lock,
    notices::{Notice, NoticeSink},
    uploads::ImageUploader,
};
use crate::domain::{
    draft::DraftDocument,
    error::DomainError,
    types::{DraftId, EditorState, SaveStatus},
    uploads::{DEFAULT_MAX_IMAGE_BYTES, ImageFile},
};

pub(crate) const METRIC_DRAFT_SAVES: &str = "drafthouse_draft_saves_total";
pub(crate) const METRIC_DRAFT_SAVE_MS: &str = "drafthouse_draft_save_ms";

const LOCK_TARGET: &str = "application::editor";
const DEFER_SLACK: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct SessionState {
    generation: u64,
    phase: Phase,
    document: DraftDocument,
    revision: u64,
    saved_revision: u64,
    last_saved: Option<Instant>,
    tally: FailureTally,
    editing_existing: bool,
    next_image_index: u32,
}

impl SessionState {
    fn fresh(generation: u64, policy: &AutosavePolicy) -> Self {
        Self {
            generation,
            phase: Phase::Idle,
            document: DraftDocument::new(),
            revision: 0,
            saved_revision: 0,
            last_saved: None,
            tally: FailureTally::new(policy.max_failures),
            editing_existing: false,
            next_image_index: 0,
        }
    }

    fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    fn settle_status(&mut self) {
        let status = if self.tally.is_blocked() {
            SaveStatus::Blocked
        } else if self.document.id().is_some() && !self.is_dirty() {
            SaveStatus::Saved
        } else {
            SaveStatus::Unsaved
        };
        self.document.set_status(status);
    }
}

enum Plan {
    Create {
        title: String,
        /// Revision covered by the draft when content was empty at creation.
        synced_revision: Option<u64>,
    },
    Update {
        id: DraftId,
        payload: BlogPostPayload,
        revision: u64,
    },
}

/// Owns one editing session: decides when to create, save or publish the
/// draft and runs those calls through the endpoint breaker.
///
/// Session state sits behind a plain mutex that is released before every
/// network call. A phase claimed under the lock keeps at most one call in
/// flight; results are applied only if the session generation still matches.
pub struct DraftCoordinator {
    api: Arc<dyn BlogApi>,
    breaker: CircuitBreaker,
    clock: Arc<dyn Clock>,
    notices: Arc<dyn NoticeSink>,
    uploader: ImageUploader,
    policy: AutosavePolicy,
    state: Mutex<SessionState>,
    settled: Notify,
    alive: AtomicBool,
}

impl DraftCoordinator {
    pub fn new(
        api: Arc<dyn BlogApi>,
        breaker: CircuitBreaker,
        clock: Arc<dyn Clock>,
        notices: Arc<dyn NoticeSink>,
        policy: AutosavePolicy,
    ) -> Self {
        let uploader = ImageUploader::new(Arc::clone(&api), DEFAULT_MAX_IMAGE_BYTES);
        Self {
            api,
            breaker,
            clock,
            notices,
            uploader,
            policy,
            state: Mutex::new(SessionState::fresh(0, &policy)),
            settled: Notify::new(),
            alive: AtomicBool::new(true),
        }
    }

    pub fn with_max_image_bytes(mut self, max_bytes: u64) -> Self {
        self.uploader = ImageUploader::new(Arc::clone(&self.api), max_bytes);
        self
    }

    pub fn policy(&self) -> AutosavePolicy {
        self.policy
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Store a settled edit; returns whether the document changed.
    pub fn record(&self, edit: Edit) -> bool {
        let mut state = self.lock("record");
        let changed = match &edit {
            Edit::Title(title) => state.document.set_title(title),
            Edit::Content(content) => state.document.set_content(content),
        };
        if changed {
            state.revision += 1;
            if !state.phase.in_flight() {
                state.settle_status();
            }
        }
        changed
    }

    /// Record `edit` and run whatever automatic work it makes due.
    pub async fn apply(&self, edit: Edit) -> Outcome {
        self.record(edit);
        self.evaluate().await
    }

    /// Run at most one automatic draft creation or auto-save.
    #[instrument(skip(self))]
    pub async fn evaluate(&self) -> Outcome {
        let (plan, claim) = match self.plan() {
            Ok(planned) => planned,
            Err(outcome) => return outcome,
        };

        let generation = claim.generation;
        let outcome = match plan {
            Plan::Create {
                title,
                synced_revision,
            } => self.create_draft(generation, title, synced_revision).await,
            Plan::Update {
                id,
                payload,
                revision,
            } => self.autosave(generation, id, payload, revision).await,
        };
        claim.settle();
        outcome
    }

    /// Publish the current document and start a fresh session on success.
    ///
    /// Waits for an automatic save already in flight. The local failure
    /// tally does not gate publishing; only the publish endpoint's breaker
    /// does.
    #[instrument(skip(self))]
    pub async fn publish(&self) -> Result<BlogPost, EditorError> {
        let (claim, id, payload) = match self.claim_publish().await {
            Ok(claim) => claim,
            Err(err) => {
                self.notices.notify(notice_for(&err));
                return Err(err);
            }
        };

        let started = self.clock.monotonic_now();
        let api = Arc::clone(&self.api);
        let target = id.clone();
        let result = self
            .breaker
            .wrap(PUBLISH_BLOG_KEY, move || async move {
                api.update_post(&target, &payload).await
            })
            .await;
        self.observe("publish", started, outcome_label(&result));

        let generation = claim.generation;
        let outcome = {
            let mut state = self.lock("publish");
            let current = self.owns(&state, generation);
            match result {
                Ok(post) => {
                    if current {
                        *state = SessionState::fresh(generation + 1, &self.policy);
                        self.notices
                            .notify(Notice::success("Post published successfully."));
                    }
                    info!(draft = %id, "Post published");
                    Ok(post)
                }
                Err(BreakerError::Open {
                    key,
                    failures,
                    max_failures,
                }) => {
                    if current {
                        state.phase = Phase::Saved;
                        state.settle_status();
                    }
                    let err = EditorError::Blocked {
                        key,
                        failures,
                        max_failures,
                    };
                    self.notices.notify(notice_for(&err));
                    Err(err)
                }
                Err(BreakerError::Inner(err)) => {
                    if current {
                        state.phase = Phase::Saved;
                        state.settle_status();
                    }
                    log_api_failure(&id, "publish", &err);
                    self.notices
                        .notify(Notice::error("Failed to publish post. Please try again."));
                    Err(EditorError::PublishFailed(err))
                }
            }
        };
        claim.settle();
        outcome
    }

    /// Adopt an existing post for editing. Draft creation stays off for this
    /// session even if loading fails.
    #[instrument(skip(self), fields(draft = %id))]
    pub async fn load_existing(&self, id: DraftId) -> Result<(), EditorError> {
        if let Err(err) = self.api.ensure_credential() {
            let err = EditorError::MissingCredential(err);
            self.notices.notify(notice_for(&err));
            return Err(err);
        }

        let claim = {
            let mut state = self.lock("load_existing");
            if !self.is_alive() {
                return Err(EditorError::Closed);
            }
            if state.phase.in_flight() {
                return Err(EditorError::Busy);
            }
            if let Some(existing) = state.document.id() {
                return Err(DomainError::invariant(format!(
                    "session already edits `{existing}`; refusing to load `{id}`"
                ))
                .into());
            }
            state.editing_existing = true;
            self.claim(&mut state, Phase::Loading)
        };

        let generation = claim.generation;
        let timeout = self.policy.load_timeout;
        let result = tokio::time::timeout(timeout, self.api.get_post(&id)).await;

        let outcome = {
            let mut state = self.lock("load_existing");
            if !self.owns(&state, generation) {
                Err(EditorError::Closed)
            } else {
                match result {
                    Ok(Ok(post)) => self.finish_load(&mut state, id, post),
                    Ok(Err(err)) => {
                        state.phase = Phase::Idle;
                        log_api_failure(&id, "load", &err);
                        let err = EditorError::LoadFailed(err);
                        self.notices.notify(notice_for(&err));
                        Err(err)
                    }
                    Err(_) => {
                        state.phase = Phase::Idle;
                        warn!(draft = %id, timeout_secs = timeout.as_secs(), "Loading post timed out");
                        let err = EditorError::LoadTimedOut(timeout);
                        self.notices.notify(notice_for(&err));
                        Err(err)
                    }
                }
            }
        };
        claim.settle();
        outcome
    }

    /// Upload an image for the current draft; returns its public URL.
    #[instrument(skip(self, file), fields(size = file.size()))]
    pub async fn upload_image(&self, file: ImageFile) -> Result<String, EditorError> {
        let claimed = {
            let mut state = self.lock("upload_image");
            if !self.is_alive() {
                Err(EditorError::Closed)
            } else if let Some(id) = state.document.id().cloned() {
                match file.validate(self.uploader.max_bytes()) {
                    Ok(()) => {
                        let index = state.next_image_index;
                        state.next_image_index += 1;
                        Ok((id, index))
                    }
                    Err(err) => Err(EditorError::from(err)),
                }
            } else {
                Err(EditorError::MissingDraft)
            }
        };
        let (id, index) = match claimed {
            Ok(claim) => claim,
            Err(err) => {
                self.notices.notify(notice_for(&err));
                return Err(err);
            }
        };

        match self.uploader.upload(&id, index, file).await {
            Ok(url) => {
                self.notices.notify(Notice::success("Image uploaded."));
                Ok(url)
            }
            Err(err) => {
                warn!(draft = %id, index, error = %err, "Image upload failed");
                self.notices
                    .notify(Notice::error(format!("Image upload failed: {err}")));
                Err(err.into())
            }
        }
    }

    /// Discard the session and clear every endpoint's breaker state.
    ///
    /// Results of calls still in flight are ignored.
    pub fn reinitialize(&self) {
        self.breaker.reset_all();
        {
            let mut state = self.lock("reinitialize");
            let generation = state.generation + 1;
            *state = SessionState::fresh(generation, &self.policy);
        }
        info!("Editor session reinitialised");
        self.settled.notify_waiters();
    }

    pub fn shutdown(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            debug!("Editor session shut down");
        }
        self.settled.notify_waiters();
    }

    pub fn snapshot(&self) -> EditorStatus {
        let state = self.lock("snapshot");
        let reported = match state.phase {
            Phase::CreatingDraft => EditorState::CreatingDraft,
            Phase::Saving | Phase::Publishing => EditorState::Saving,
            _ if state.tally.is_blocked() => EditorState::Blocked,
            _ if self.automatic_key(&state).is_some_and(|key| self.breaker.is_blocked(key)) => {
                EditorState::Blocked
            }
            Phase::Saved => EditorState::Saved,
            Phase::Idle | Phase::Loading => EditorState::Idle,
        };

        EditorStatus {
            state: reported,
            draft_id: state.document.id().cloned(),
            title: state.document.title().to_string(),
            last_saved_at: state.document.last_saved_at(),
            failure_count: state.tally.count(),
            loading: state.phase == Phase::Loading,
            publishing: state.phase == Phase::Publishing,
        }
    }

    /// Raw document fields as last recorded.
    pub fn document(&self) -> DraftDocument {
        self.lock("document").document.clone()
    }

    fn plan(&self) -> Result<(Plan, PhaseClaim<'_>), Outcome> {
        if !self.is_alive() {
            return Err(Outcome::Skipped);
        }
        let mut state = self.lock("plan");
        if state.phase.in_flight() {
            return Err(Outcome::Skipped);
        }
        if state.tally.is_blocked() {
            return Err(Outcome::Blocked);
        }

        let Some(id) = state.document.id().cloned() else {
            if state.editing_existing || !state.document.has_title() {
                return Err(Outcome::Skipped);
            }
            self.check_automatic(CREATE_DRAFT_KEY)?;
            let synced_revision = state
                .document
                .content()
                .trim()
                .is_empty()
                .then_some(state.revision);
            let title = state.document.title().trim().to_string();
            state.document.set_status(SaveStatus::Saving);
            let claim = self.claim(&mut state, Phase::CreatingDraft);
            return Ok((
                Plan::Create {
                    title,
                    synced_revision,
                },
                claim,
            ));
        };

        if !state.is_dirty() {
            return Err(Outcome::Skipped);
        }
        if !state.document.has_title() {
            debug!(draft = %id, "Auto-save skipped: title is blank");
            state.phase = Phase::Idle;
            return Err(Outcome::Skipped);
        }
        if let Some(last) = state.last_saved {
            let elapsed = self.clock.monotonic_now().saturating_duration_since(last);
            if elapsed <= self.policy.min_interval {
                return Err(Outcome::Deferred {
                    until: last + self.policy.min_interval + DEFER_SLACK,
                });
            }
        }
        self.check_automatic(UPDATE_BLOG_KEY)?;

        let payload = match state.document.payload(PostStatus::Draft) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(draft = %id, error = %err, "Auto-save skipped: payload rejected");
                return Err(Outcome::Skipped);
            }
        };
        let revision = state.revision;
        state.document.set_status(SaveStatus::Saving);
        let claim = self.claim(&mut state, Phase::Saving);
        Ok((
            Plan::Update {
                id,
                payload,
                revision,
            },
            claim,
        ))
    }

    /// Move the session into an in-flight `phase`. The returned claim puts
    /// the previous phase back if it is dropped before `settle`.
    fn claim(&self, state: &mut SessionState, phase: Phase) -> PhaseClaim<'_> {
        let previous = state.phase;
        state.phase = phase;
        PhaseClaim {
            coordinator: self,
            generation: state.generation,
            previous,
            armed: true,
        }
    }

    fn check_automatic(&self, key: &str) -> Result<(), Outcome> {
        if let Err(err) = self.api.ensure_credential() {
            warn!(endpoint = key, error = %err, "Automatic save skipped without credential");
            self.notices.notify(Notice::error(err.to_string()));
            return Err(Outcome::MissingCredential);
        }
        if self.breaker.is_blocked(key) {
            self.notices.notify(notice_for(&self.blocked_error(key)));
            return Err(Outcome::Blocked);
        }
        Ok(())
    }

    async fn create_draft(
        &self,
        generation: u64,
        title: String,
        synced_revision: Option<u64>,
    ) -> Outcome {
        let started = self.clock.monotonic_now();
        let api = Arc::clone(&self.api);
        let result = self
            .breaker
            .wrap(CREATE_DRAFT_KEY, move || async move {
                api.create_draft(&title).await
            })
            .await;
        self.observe("create", started, outcome_label(&result));

        let mut state = self.lock("create_draft");
        if !self.owns(&state, generation) {
            debug!("Discarding draft creation result from a closed session");
            return Outcome::Skipped;
        }

        match result {
            Ok(created) => {
                let id = DraftId::new(created.id);
                if let Err(err) = state.document.assign_id(id.clone()) {
                    error!(error = %err, "Draft creation returned a second id");
                    state.phase = Phase::Idle;
                    state.settle_status();
                    return Outcome::Failed;
                }
                state.document.mark_saved(self.clock.wall_now());
                state.last_saved = Some(self.clock.monotonic_now());
                if let Some(revision) = synced_revision {
                    state.saved_revision = revision;
                }
                state.tally.reset();
                state.phase = Phase::Saved;
                state.settle_status();
                info!(draft = %id, "Draft created");
                self.notices
                    .notify(Notice::info("Draft created. Auto-saving is now active."));
                Outcome::DraftCreated
            }
            Err(BreakerError::Open { key, .. }) => {
                state.phase = Phase::Idle;
                state.settle_status();
                self.notices.notify(notice_for(&self.blocked_error(&key)));
                Outcome::Blocked
            }
            Err(BreakerError::Inner(err)) => {
                error_for_missing_route(&err);
                self.count_failure(&mut state, "create the draft", &err)
            }
        }
    }

    async fn autosave(
        &self,
        generation: u64,
        id: DraftId,
        payload: BlogPostPayload,
        revision: u64,
    ) -> Outcome {
        let started = self.clock.monotonic_now();
        let api = Arc::clone(&self.api);
        let target = id.clone();
        let result = self
            .breaker
            .wrap(UPDATE_BLOG_KEY, move || async move {
                api.update_post(&target, &payload).await
            })
            .await;
        self.observe("autosave", started, outcome_label(&result));

        let mut state = self.lock("autosave");
        if !self.owns(&state, generation) {
            debug!(draft = %id, "Discarding auto-save result from a closed session");
            return Outcome::Skipped;
        }

        match result {
            Ok(_) => {
                state.document.mark_saved(self.clock.wall_now());
                state.last_saved = Some(self.clock.monotonic_now());
                state.saved_revision = revision;
                state.tally.reset();
                state.phase = Phase::Saved;
                state.settle_status();
                debug!(draft = %id, revision, "Draft auto-saved");
                Outcome::Saved
            }
            Err(BreakerError::Open { key, .. }) => {
                state.phase = Phase::Idle;
                state.settle_status();
                self.notices.notify(notice_for(&self.blocked_error(&key)));
                Outcome::Blocked
            }
            Err(BreakerError::Inner(err)) => {
                log_api_failure(&id, "autosave", &err);
                self.count_failure(&mut state, "auto-save", &err)
            }
        }
    }

    fn count_failure(&self, state: &mut SessionState, action: &str, err: &ApiError) -> Outcome {
        state.phase = Phase::Idle;
        let blocked = state.tally.record_failure();
        state.settle_status();
        let failures = state.tally.count();
        let max_failures = state.tally.max();

        if blocked {
            warn!(
                failures,
                max_failures, "Automatic saving disabled after repeated failures"
            );
            self.notices.notify(Notice::error(format!(
                "Too many failures; automatic saving is disabled. Could not {action}: {err}"
            )));
            Outcome::Blocked
        } else {
            self.notices.notify(Notice::warning(format!(
                "Could not {action}: {err} (attempt {failures}/{max_failures})"
            )));
            Outcome::Failed
        }
    }

    async fn claim_publish(
        &self,
    ) -> Result<(PhaseClaim<'_>, DraftId, BlogPostPayload), EditorError> {
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock("publish");
                if !self.is_alive() {
                    return Err(EditorError::Closed);
                }
                match state.phase {
                    Phase::Publishing => return Err(EditorError::Busy),
                    phase if phase.in_flight() => {}
                    _ => return self.begin_publish(&mut state),
                }
            }

            debug!("Publish waiting for in-flight save");
            notified.await;
        }
    }

    fn begin_publish(
        &self,
        state: &mut SessionState,
    ) -> Result<(PhaseClaim<'_>, DraftId, BlogPostPayload), EditorError> {
        if !state.document.has_title() {
            return Err(EditorError::MissingTitle);
        }
        let Some(id) = state.document.id().cloned() else {
            return Err(EditorError::MissingDraft);
        };
        self.api
            .ensure_credential()
            .map_err(EditorError::MissingCredential)?;
        if self.breaker.is_blocked(PUBLISH_BLOG_KEY) {
            return Err(self.blocked_error(PUBLISH_BLOG_KEY));
        }

        let payload = state.document.payload(PostStatus::Published)?;
        state.document.set_status(SaveStatus::Saving);
        Ok((self.claim(state, Phase::Publishing), id, payload))
    }

    fn finish_load(
        &self,
        state: &mut SessionState,
        id: DraftId,
        post: BlogPost,
    ) -> Result<(), EditorError> {
        if let Err(err) = state.document.assign_id(id.clone()) {
            state.phase = Phase::Idle;
            return Err(err.into());
        }
        state.document.set_title(&post.title);
        state.document.set_content(&post.content);
        state.document.mark_saved(self.clock.wall_now());
        state.last_saved = Some(self.clock.monotonic_now());
        state.revision += 1;
        state.saved_revision = state.revision;
        state.tally.reset();
        state.phase = Phase::Saved;
        state.settle_status();

        info!(draft = %id, "Post loaded for editing");
        self.notices.notify(Notice::success("Post loaded for editing."));
        Ok(())
    }

    /// Breaker key of the next automatic call this session would make.
    fn automatic_key(&self, state: &SessionState) -> Option<&'static str> {
        match state.document.id() {
            Some(_) => Some(UPDATE_BLOG_KEY),
            None if !state.editing_existing => Some(CREATE_DRAFT_KEY),
            None => None,
        }
    }

    fn blocked_error(&self, key: &str) -> EditorError {
        EditorError::Blocked {
            key: key.to_string(),
            failures: self.breaker.failure_count(key),
            max_failures: self.breaker.policy().max_failures.get(),
        }
    }

    fn owns(&self, state: &SessionState, generation: u64) -> bool {
        self.is_alive() && state.generation == generation
    }

    fn observe(&self, kind: &'static str, started: Instant, outcome: &'static str) {
        let elapsed = self.clock.monotonic_now().saturating_duration_since(started);
        counter!(METRIC_DRAFT_SAVES, "kind" => kind, "outcome" => outcome).increment(1);
        histogram!(METRIC_DRAFT_SAVE_MS, "kind" => kind).record(elapsed.as_secs_f64() * 1000.0);
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, SessionState> {
        mutex_lock(&self.state, LOCK_TARGET, op)
    }
}

/// Guard for a phase claimed by `evaluate`, `publish` or `load_existing`.
///
/// Dropping the calling future mid-request would otherwise leave the phase
/// in flight and park every later publish. Waiters are woken either way.
struct PhaseClaim<'a> {
    coordinator: &'a DraftCoordinator,
    generation: u64,
    previous: Phase,
    armed: bool,
}

impl PhaseClaim<'_> {
    /// The owning call applied its result; only wake waiters.
    fn settle(mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseClaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.coordinator.lock("release");
            if state.generation == self.generation && state.phase.in_flight() {
                state.phase = self.previous;
                state.settle_status();
                debug!(
                    generation = self.generation,
                    phase = ?self.previous,
                    "In-flight call dropped; phase released"
                );
            }
        }
        self.coordinator.settled.notify_waiters();
    }
}

fn outcome_label<T, E>(result: &Result<T, BreakerError<E>>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(BreakerError::Open { .. }) => "rejected",
        Err(BreakerError::Inner(_)) => "failure",
    }
}

fn notice_for(err: &EditorError) -> Notice {
    match err {
        EditorError::Busy | EditorError::Blocked { .. } => Notice::warning(err.to_string()),
        _ => Notice::error(err.to_string()),
    }
}

fn log_api_failure(id: &DraftId, action: &'static str, err: &ApiError) {
    error_for_missing_route(err);
    warn!(draft = %id, action, error = %err, "Blog API call failed");
}

fn error_for_missing_route(err: &ApiError) {
    if let ApiError::NotFound { path } = err {
        error!(path = %path, "Blog API route missing; check the configured base URL");
    }
}
