use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{watch, Mutex, MutexGuard};
use uuid::Uuid;

use super::errors::AttemptError;
use super::retry::RetryPolicy;
use super::session::{
    AttemptPhase, AttemptReport, AttemptSession, AttemptView, DisclaimerSummary, FinalizeJob,
    FinalizeResolution, PendingAnswer, Progress, SyncStatus, TickOutcome,
};
use crate::api::AssessmentBackend;
use crate::core::config::Settings;
use crate::core::time::Clock;
use crate::models::{AnswerMode, Assessment, ImageFile};
use crate::repositories::attempts::{AttemptRepository, PersistedAttempt};

const DEFAULT_MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptOptions {
    pub retry: RetryPolicy,
    pub max_image_bytes: u64,
}

impl AttemptOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            retry: RetryPolicy::from_settings(settings.submission()),
            max_image_bytes: settings.uploads().max_image_bytes(),
        }
    }
}

impl Default for AttemptOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(3, std::time::Duration::from_millis(500)),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

/// Result of closing an attempt, so the student always learns whether the
/// final submission was recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    Submitted(AttemptReport),
    /// The attempt stays in `Submitting`; call `retry_finalize`.
    RetryableFailure { attempt_id: Uuid, error: String },
    FatalFailure(AttemptReport),
    /// The attempt was abandoned while the request was in flight.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickResult {
    Inactive,
    Untimed,
    Running(u64),
    Finalized(FinalizeOutcome),
}

/// Drives an [`AttemptSession`] against the backend. Cheap to clone; clones
/// share the same session.
#[derive(Clone)]
pub struct AttemptController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    backend: Arc<dyn AssessmentBackend>,
    repository: Arc<dyn AttemptRepository>,
    clock: Arc<dyn Clock>,
    options: AttemptOptions,
    session: Mutex<AttemptSession>,
    views: watch::Sender<AttemptView>,
}

impl AttemptController {
    pub fn new(
        student_id: impl Into<String>,
        backend: Arc<dyn AssessmentBackend>,
        repository: Arc<dyn AttemptRepository>,
        clock: Arc<dyn Clock>,
        options: AttemptOptions,
    ) -> Self {
        let session = AttemptSession::new(student_id);
        let (views, _) = watch::channel(session.view());

        Self {
            inner: Arc::new(ControllerInner {
                backend,
                repository,
                clock,
                options,
                session: Mutex::new(session),
                views,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AttemptView> {
        self.inner.views.subscribe()
    }

    pub fn view(&self) -> AttemptView {
        self.inner.views.borrow().clone()
    }

    pub async fn phase(&self) -> AttemptPhase {
        self.inner.session.lock().await.phase()
    }

    pub async fn progress(&self) -> Progress {
        self.inner.session.lock().await.progress()
    }

    pub async fn begin(&self, assessment: Assessment) -> Result<DisclaimerSummary, AttemptError> {
        let mut session = self.lock().await;
        let summary = session.begin(assessment)?;
        self.publish(&session);
        Ok(summary)
    }

    pub async fn cancel(&self) -> Result<(), AttemptError> {
        let mut session = self.lock().await;
        session.cancel()?;
        self.publish(&session);
        Ok(())
    }

    pub async fn agree(&self) -> Result<Uuid, AttemptError> {
        let mut session = self.lock().await;
        let stored = match (session.phase(), session.assessment()) {
            (AttemptPhase::Disclaimer, Some(assessment)) => {
                let assessment_id = assessment.id.clone();
                self.load_stored(session.student_id(), &assessment_id).await
            }
            _ => None,
        };

        let attempt_id = session.agree(self.inner.clock.now(), stored)?;
        tracing::info!(
            attempt_id = %attempt_id,
            assessment_id = session.assessment().map(|assessment| assessment.id.as_str()).unwrap_or_default(),
            "Attempt started"
        );
        self.persist(&session).await;
        self.publish(&session);
        Ok(attempt_id)
    }

    pub async fn select_choice(&self, choice: usize) -> Result<(), AttemptError> {
        self.edit(|session| session.select_choice(choice)).await
    }

    pub async fn toggle_choice(&self, choice: usize) -> Result<(), AttemptError> {
        self.edit(|session| session.toggle_choice(choice)).await
    }

    pub async fn choose_mode(&self, mode: AnswerMode) -> Result<(), AttemptError> {
        self.edit(|session| session.choose_mode(mode)).await
    }

    pub async fn set_text(&self, text: &str) -> Result<(), AttemptError> {
        self.edit(|session| session.set_text(text)).await
    }

    pub async fn attach_image(&self, image: ImageFile) -> Result<(), AttemptError> {
        let max_bytes = self.inner.options.max_image_bytes;
        self.edit(move |session| session.attach_image(image, max_bytes)).await
    }

    /// Sends the current answer once, then moves to the next question. A
    /// failed send still advances; the question is marked `Failed` and is
    /// re-sent by `resync` or on finalize.
    pub async fn next(&self) -> Result<SyncStatus, AttemptError> {
        let pending = {
            let mut session = self.lock().await;
            let pending = session.begin_next()?;
            self.publish(&session);
            pending
        };

        let synced = self.deliver(&pending).await;

        let mut session = self.lock().await;
        if session.complete_next(&pending, synced) {
            self.persist(&session).await;
            self.publish(&session);
        } else {
            tracing::debug!(attempt_id = %pending.attempt_id, "Discarding answer response for stale attempt");
        }

        Ok(if synced { SyncStatus::Synced } else { SyncStatus::Failed })
    }

    pub async fn finish(&self) -> Result<FinalizeOutcome, AttemptError> {
        let job = {
            let mut session = self.lock().await;
            let job = session.begin_finish()?;
            self.persist(&session).await;
            self.publish(&session);
            job
        };

        Ok(self.run_finalize(job).await)
    }

    pub async fn retry_finalize(&self) -> Result<FinalizeOutcome, AttemptError> {
        let job = {
            let mut session = self.lock().await;
            let job = session.retry_finalize()?;
            self.publish(&session);
            job
        };

        Ok(self.run_finalize(job).await)
    }

    /// Re-sends answers of earlier questions whose delivery failed. Returns
    /// how many went through.
    pub async fn resync(&self) -> Result<usize, AttemptError> {
        let pending = {
            let mut session = self.lock().await;
            let pending = session.begin_resync()?;
            self.publish(&session);
            pending
        };

        let mut delivered = 0;
        for answer in &pending {
            let synced = self.deliver(answer).await;
            if synced {
                delivered += 1;
            }
            let mut session = self.lock().await;
            session.record_answer_sync(answer, synced);
        }

        let mut session = self.lock().await;
        if let Some(first) = pending.first() {
            session.end_resync(first.session);
        }
        self.persist(&session).await;
        self.publish(&session);
        Ok(delivered)
    }

    /// One countdown step. Expiry finalizes the attempt in place.
    pub async fn tick(&self) -> TickResult {
        let job = {
            let mut session = self.lock().await;
            match session.tick(self.inner.clock.now()) {
                TickOutcome::Inactive => return TickResult::Inactive,
                TickOutcome::Disabled => return TickResult::Untimed,
                TickOutcome::Running(remaining) => {
                    self.publish(&session);
                    return TickResult::Running(remaining);
                }
                TickOutcome::Expired(job) => {
                    tracing::info!(
                        attempt_id = %job.attempt_id,
                        assessment_id = %job.assessment_id,
                        "Deadline reached, finalizing attempt"
                    );
                    self.persist(&session).await;
                    self.publish(&session);
                    job
                }
            }
        };

        TickResult::Finalized(self.run_finalize(job).await)
    }

    /// Returns to `Idle`. The stored attempt is kept so it can be resumed.
    pub async fn abandon(&self) -> AttemptPhase {
        let mut session = self.lock().await;
        let previous = session.abandon();
        tracing::info!(phase = ?previous, "Attempt abandoned");
        self.publish(&session);
        previous
    }

    async fn run_finalize(&self, job: FinalizeJob) -> FinalizeOutcome {
        for answer in &job.answers {
            let synced = self.deliver(answer).await;
            let mut session = self.lock().await;
            if session.record_answer_sync(answer, synced) {
                self.publish(&session);
            }
        }

        let backend = &self.inner.backend;
        let result = self
            .inner
            .options
            .retry
            .run("submit_assessment", || backend.submit_assessment(&job.assessment_id))
            .await;

        let mut session = self.lock().await;
        let outcome = match session.complete_finalize(job.session, result, self.now()) {
            FinalizeResolution::Completed(report) => {
                metrics::counter!("assessment_finalize_total", "outcome" => "submitted").increment(1);
                tracing::info!(
                    attempt_id = %report.attempt_id,
                    assessment_id = %report.assessment_id,
                    mode = ?report.mode,
                    answered = report.answered,
                    unsynced = report.unsynced_questions.len(),
                    "Assessment submitted"
                );
                self.forget(session.student_id(), &job.assessment_id).await;
                FinalizeOutcome::Submitted(report)
            }
            FinalizeResolution::Pending(error) => {
                metrics::counter!("assessment_finalize_total", "outcome" => "retryable").increment(1);
                tracing::warn!(attempt_id = %job.attempt_id, error = %error, "Final submission failed, retry available");
                self.persist(&session).await;
                FinalizeOutcome::RetryableFailure { attempt_id: job.attempt_id, error }
            }
            FinalizeResolution::Rejected(report) => {
                metrics::counter!("assessment_finalize_total", "outcome" => "fatal").increment(1);
                tracing::error!(
                    attempt_id = %report.attempt_id,
                    assessment_id = %report.assessment_id,
                    final_submission = ?report.final_submission,
                    "Final submission rejected"
                );
                self.forget(session.student_id(), &job.assessment_id).await;
                FinalizeOutcome::FatalFailure(report)
            }
            FinalizeResolution::Stale => {
                tracing::debug!(attempt_id = %job.attempt_id, "Discarding finalize response for stale attempt");
                FinalizeOutcome::Abandoned
            }
        };

        self.publish(&session);
        outcome
    }

    async fn deliver(&self, answer: &PendingAnswer) -> bool {
        match self.inner.backend.submit_answer(&answer.question_id, &answer.payload).await {
            Ok(()) => {
                metrics::counter!("answer_submissions_total", "status" => "synced").increment(1);
                tracing::debug!(
                    attempt_id = %answer.attempt_id,
                    question_id = %answer.question_id,
                    answer_type = answer.payload.mode().as_str(),
                    "Answer submitted"
                );
                true
            }
            Err(err) => {
                metrics::counter!("answer_submissions_total", "status" => "failed").increment(1);
                tracing::warn!(
                    attempt_id = %answer.attempt_id,
                    question_id = %answer.question_id,
                    error = %err,
                    "Answer submission failed"
                );
                false
            }
        }
    }

    async fn edit<F>(&self, operation: F) -> Result<(), AttemptError>
    where
        F: FnOnce(&mut AttemptSession) -> Result<(), AttemptError>,
    {
        let mut session = self.lock().await;
        operation(&mut session)?;
        self.persist(&session).await;
        self.publish(&session);
        Ok(())
    }

    async fn load_stored(&self, student_id: &str, assessment_id: &str) -> Option<PersistedAttempt> {
        match self.inner.repository.load(student_id, assessment_id).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(assessment_id, error = %err, "Failed to load stored attempt");
                None
            }
        }
    }

    async fn persist(&self, session: &AttemptSession) {
        let Some(snapshot) = session.snapshot(self.now()) else {
            return;
        };
        if let Err(err) = self.inner.repository.save(&snapshot).await {
            tracing::warn!(
                attempt_id = %snapshot.attempt_id,
                assessment_id = %snapshot.assessment_id,
                error = %err,
                "Failed to persist attempt"
            );
        }
    }

    async fn forget(&self, student_id: &str, assessment_id: &str) {
        if let Err(err) = self.inner.repository.remove(student_id, assessment_id).await {
            tracing::warn!(assessment_id, error = %err, "Failed to remove stored attempt");
        }
    }

    fn publish(&self, session: &AttemptSession) {
        self.inner.views.send_replace(session.view());
    }

    fn now(&self) -> OffsetDateTime {
        self.inner.clock.now()
    }

    async fn lock(&self) -> MutexGuard<'_, AttemptSession> {
        self.inner.session.lock().await
    }
}
