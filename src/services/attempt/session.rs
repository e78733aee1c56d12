use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::answers::AnswerBuffer;
use super::countdown::{Countdown, Tick};
use super::errors::AttemptError;
use crate::api::ApiError;
use crate::models::{AnswerMode, AnswerPayload, Assessment, AssessmentKind, ImageFile, Question};
use crate::repositories::attempts::PersistedAttempt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptPhase {
    Idle,
    Disclaimer,
    InProgress,
    Submitting,
    Completed,
}

/// Per-question delivery state of the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    NotSent,
    InFlight,
    Synced,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeMode {
    Manual,
    Deadline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum FinalSubmission {
    Recorded,
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptReport {
    pub attempt_id: Uuid,
    pub assessment_id: String,
    pub title: String,
    pub mode: FinalizeMode,
    pub answered: usize,
    pub total: usize,
    /// Answered questions whose answer the backend never acknowledged.
    pub unsynced_questions: Vec<String>,
    pub final_submission: FinalSubmission,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

impl AttemptReport {
    pub fn fully_recorded(&self) -> bool {
        self.final_submission == FinalSubmission::Recorded && self.unsynced_questions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisclaimerSummary {
    pub title: String,
    pub kind: AssessmentKind,
    pub question_count: usize,
    pub duration_minutes: Option<u32>,
    pub total_marks: f64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub deadline: Option<OffsetDateTime>,
}

impl From<&Assessment> for DisclaimerSummary {
    fn from(assessment: &Assessment) -> Self {
        Self {
            title: assessment.title.clone(),
            kind: assessment.kind,
            question_count: assessment.questions.len(),
            duration_minutes: assessment.duration_minutes.filter(|minutes| *minutes > 0),
            total_marks: assessment.total_marks,
            deadline: assessment.deadline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
    pub fraction: f64,
}

impl Progress {
    fn of(answers: &[AnswerBuffer]) -> Self {
        let answered = answers.iter().filter(|answer| answer.is_answered()).count();
        let total = answers.len();
        let fraction = if total == 0 { 0.0 } else { answered as f64 / total as f64 };
        Self { answered, total, fraction }
    }

    fn empty() -> Self {
        Self { answered: 0, total: 0, fraction: 0.0 }
    }
}

/// An answer handed out for delivery. `session` identifies the `agree`
/// that produced it; a response carrying any other session is dropped,
/// including one sent before the same attempt was abandoned and resumed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAnswer {
    pub attempt_id: Uuid,
    pub session: Uuid,
    pub index: usize,
    pub question_id: String,
    pub payload: AnswerPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeJob {
    pub attempt_id: Uuid,
    pub session: Uuid,
    pub assessment_id: String,
    pub mode: FinalizeMode,
    pub answers: Vec<PendingAnswer>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No attempt is running.
    Inactive,
    Disabled,
    Running(u64),
    Expired(FinalizeJob),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeResolution {
    Completed(AttemptReport),
    Rejected(AttemptReport),
    Pending(String),
    Stale,
}

/// Snapshot handed to the UI after every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptView {
    pub phase: AttemptPhase,
    pub attempt_id: Option<Uuid>,
    pub assessment_id: Option<String>,
    pub title: Option<String>,
    pub current_index: Option<usize>,
    pub question: Option<Question>,
    pub current_answered: bool,
    pub current_mode: Option<AnswerMode>,
    pub progress: Progress,
    pub remaining_seconds: Option<u64>,
    pub can_advance: bool,
    pub can_finish: bool,
    pub busy: bool,
    pub sync: Vec<SyncStatus>,
    pub pending_sync: usize,
    pub last_error: Option<String>,
    pub report: Option<AttemptReport>,
}

#[derive(Debug, Clone)]
pub struct Attempt {
    id: Uuid,
    session: Uuid,
    assessment: Assessment,
    current: usize,
    answers: Vec<AnswerBuffer>,
    sync: Vec<SyncStatus>,
    countdown: Countdown,
    navigating: bool,
    finalizing: bool,
    mode: Option<FinalizeMode>,
    last_error: Option<String>,
}

impl Attempt {
    fn fresh(assessment: Assessment, now: OffsetDateTime) -> Self {
        let answers: Vec<AnswerBuffer> =
            assessment.questions.iter().map(AnswerBuffer::for_question).collect();
        let sync = vec![SyncStatus::NotSent; answers.len()];
        let countdown = Countdown::arm(now, assessment.duration_seconds());

        Self {
            id: Uuid::new_v4(),
            session: Uuid::new_v4(),
            assessment,
            current: 0,
            answers,
            sync,
            countdown,
            navigating: false,
            finalizing: false,
            mode: None,
            last_error: None,
        }
    }

    fn rehydrate(assessment: Assessment, stored: PersistedAttempt, now: OffsetDateTime) -> Self {
        // A response that never came back cannot be assumed delivered.
        let sync = stored
            .sync
            .into_iter()
            .map(|status| if status == SyncStatus::InFlight { SyncStatus::Failed } else { status })
            .collect();

        Self {
            id: stored.attempt_id,
            session: Uuid::new_v4(),
            assessment,
            current: stored.current_index,
            answers: stored.answers,
            sync,
            countdown: Countdown::resume(stored.deadline, now),
            navigating: false,
            finalizing: false,
            mode: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Token of the `agree` that entered this attempt. Changes on resume.
    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &Question {
        &self.assessment.questions[self.current]
    }

    pub fn answer(&self, index: usize) -> Option<&AnswerBuffer> {
        self.answers.get(index)
    }

    pub fn sync(&self) -> &[SyncStatus] {
        &self.sync
    }

    pub fn remaining_seconds(&self) -> Option<u64> {
        self.countdown.remaining()
    }

    fn is_last(&self) -> bool {
        self.current + 1 == self.answers.len()
    }

    fn current_answered(&self) -> bool {
        self.answers[self.current].is_answered()
    }

    fn pending(&self, index: usize) -> Option<PendingAnswer> {
        let question = &self.assessment.questions[index];
        self.answers[index].payload(question).map(|payload| PendingAnswer {
            attempt_id: self.id,
            session: self.session,
            index,
            question_id: question.id.clone(),
            payload,
        })
    }

    fn record_sync(&mut self, index: usize, synced: bool) {
        if let Some(status) = self.sync.get_mut(index) {
            *status = if synced { SyncStatus::Synced } else { SyncStatus::Failed };
        }
    }

    /// The current answer if it still needs sending, plus every earlier
    /// answer whose delivery failed.
    fn finalize_job(&mut self, mode: FinalizeMode) -> FinalizeJob {
        let mut answers = Vec::new();
        for index in 0..self.answers.len() {
            let needs_send = match self.sync[index] {
                SyncStatus::Failed => true,
                SyncStatus::NotSent => index == self.current,
                SyncStatus::InFlight | SyncStatus::Synced => false,
            };
            if !needs_send {
                continue;
            }
            if let Some(pending) = self.pending(index) {
                self.sync[index] = SyncStatus::InFlight;
                answers.push(pending);
            }
        }

        FinalizeJob {
            attempt_id: self.id,
            session: self.session,
            assessment_id: self.assessment.id.clone(),
            mode,
            answers,
        }
    }

    fn report(&self, final_submission: FinalSubmission, now: OffsetDateTime) -> AttemptReport {
        let progress = Progress::of(&self.answers);
        let unsynced_questions = self
            .answers
            .iter()
            .zip(&self.sync)
            .zip(&self.assessment.questions)
            .filter(|((answer, status), _)| answer.is_answered() && **status != SyncStatus::Synced)
            .map(|(_, question)| question.id.clone())
            .collect();

        AttemptReport {
            attempt_id: self.id,
            assessment_id: self.assessment.id.clone(),
            title: self.assessment.title.clone(),
            mode: self.mode.unwrap_or(FinalizeMode::Manual),
            answered: progress.answered,
            total: progress.total,
            unsynced_questions,
            final_submission,
            completed_at: now,
        }
    }

    fn snapshot(&self, student_id: &str, now: OffsetDateTime) -> PersistedAttempt {
        PersistedAttempt {
            version: PersistedAttempt::VERSION,
            attempt_id: self.id,
            student_id: student_id.to_string(),
            assessment_id: self.assessment.id.clone(),
            current_index: self.current,
            answers: self.answers.clone(),
            sync: self.sync.clone(),
            deadline: self.countdown.deadline(),
            saved_at: now,
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Idle,
    Disclaimer(Assessment),
    InProgress(Attempt),
    Submitting(Attempt),
    Completed(AttemptReport),
}

/// The attempt state machine. Purely synchronous: network effects are
/// described by the values it hands out and reported back by the caller.
#[derive(Debug, Clone)]
pub struct AttemptSession {
    student_id: String,
    state: State,
}

impl AttemptSession {
    pub fn new(student_id: impl Into<String>) -> Self {
        Self { student_id: student_id.into(), state: State::Idle }
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    pub fn phase(&self) -> AttemptPhase {
        match self.state {
            State::Idle => AttemptPhase::Idle,
            State::Disclaimer(_) => AttemptPhase::Disclaimer,
            State::InProgress(_) => AttemptPhase::InProgress,
            State::Submitting(_) => AttemptPhase::Submitting,
            State::Completed(_) => AttemptPhase::Completed,
        }
    }

    pub fn assessment(&self) -> Option<&Assessment> {
        match &self.state {
            State::Disclaimer(assessment) => Some(assessment),
            State::InProgress(attempt) | State::Submitting(attempt) => Some(&attempt.assessment),
            State::Idle | State::Completed(_) => None,
        }
    }

    pub fn attempt(&self) -> Option<&Attempt> {
        match &self.state {
            State::InProgress(attempt) | State::Submitting(attempt) => Some(attempt),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&AttemptReport> {
        match &self.state {
            State::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn begin(&mut self, assessment: Assessment) -> Result<DisclaimerSummary, AttemptError> {
        match self.phase() {
            AttemptPhase::Idle | AttemptPhase::Completed => {}
            actual => return Err(AttemptError::WrongPhase { expected: AttemptPhase::Idle, actual }),
        }
        if !assessment.status.is_attemptable() {
            return Err(AttemptError::NotAttemptable(assessment.id));
        }

        let summary = DisclaimerSummary::from(&assessment);
        self.state = State::Disclaimer(assessment);
        Ok(summary)
    }

    pub fn cancel(&mut self) -> Result<(), AttemptError> {
        match self.state {
            State::Disclaimer(_) => {
                self.state = State::Idle;
                Ok(())
            }
            _ => Err(self.wrong_phase(AttemptPhase::Disclaimer)),
        }
    }

    /// Enters the attempt. A stored attempt for the same student and
    /// assessment is resumed instead of starting over.
    pub fn agree(
        &mut self,
        now: OffsetDateTime,
        stored: Option<PersistedAttempt>,
    ) -> Result<Uuid, AttemptError> {
        let assessment = match std::mem::replace(&mut self.state, State::Idle) {
            State::Disclaimer(assessment) => assessment,
            other => {
                self.state = other;
                return Err(self.wrong_phase(AttemptPhase::Disclaimer));
            }
        };
        if assessment.questions.is_empty() {
            let id = assessment.id.clone();
            self.state = State::Disclaimer(assessment);
            return Err(AttemptError::NoQuestions(id));
        }

        let attempt = match stored.filter(|stored| stored.matches(&self.student_id, &assessment)) {
            Some(stored) => {
                tracing::info!(
                    assessment_id = %assessment.id,
                    attempt_id = %stored.attempt_id,
                    current_index = stored.current_index,
                    "Resuming stored attempt"
                );
                Attempt::rehydrate(assessment, stored, now)
            }
            None => Attempt::fresh(assessment, now),
        };

        let id = attempt.id;
        self.state = State::InProgress(attempt);
        Ok(id)
    }

    /// Drops whatever is running and returns to the list.
    pub fn abandon(&mut self) -> AttemptPhase {
        let previous = self.phase();
        self.state = State::Idle;
        previous
    }

    pub fn select_choice(&mut self, choice: usize) -> Result<(), AttemptError> {
        let attempt = self.editable()?;
        let count = attempt.current_question().choices.len();
        attempt.answers[attempt.current].select_choice(choice, count)?;
        attempt.sync[attempt.current] = SyncStatus::NotSent;
        Ok(())
    }

    pub fn toggle_choice(&mut self, choice: usize) -> Result<(), AttemptError> {
        let attempt = self.editable()?;
        let count = attempt.current_question().choices.len();
        attempt.answers[attempt.current].toggle_choice(choice, count)?;
        attempt.sync[attempt.current] = SyncStatus::NotSent;
        Ok(())
    }

    pub fn choose_mode(&mut self, mode: AnswerMode) -> Result<(), AttemptError> {
        let attempt = self.editable()?;
        attempt.answers[attempt.current].choose_mode(mode)
    }

    pub fn set_text(&mut self, text: &str) -> Result<(), AttemptError> {
        let attempt = self.editable()?;
        attempt.answers[attempt.current].set_text(text)?;
        attempt.sync[attempt.current] = SyncStatus::NotSent;
        Ok(())
    }

    pub fn attach_image(&mut self, image: ImageFile, max_bytes: u64) -> Result<(), AttemptError> {
        let attempt = self.editable()?;
        attempt.answers[attempt.current].attach_image(image, max_bytes)?;
        attempt.sync[attempt.current] = SyncStatus::NotSent;
        Ok(())
    }

    /// Recomputed from the answer buffers on every call.
    pub fn progress(&self) -> Progress {
        self.attempt().map(|attempt| Progress::of(&attempt.answers)).unwrap_or_else(Progress::empty)
    }

    pub fn can_advance(&self) -> bool {
        match &self.state {
            State::InProgress(attempt) => {
                !attempt.navigating && !attempt.is_last() && attempt.current_answered()
            }
            _ => false,
        }
    }

    pub fn can_finish(&self) -> bool {
        match &self.state {
            State::InProgress(attempt) => {
                !attempt.navigating && attempt.is_last() && attempt.current_answered()
            }
            _ => false,
        }
    }

    /// Hands out the current answer for delivery. The index only moves once
    /// [`complete_next`](Self::complete_next) reports back.
    pub fn begin_next(&mut self) -> Result<PendingAnswer, AttemptError> {
        let attempt = self.in_progress_mut()?;
        if attempt.navigating {
            return Err(AttemptError::Busy);
        }
        if attempt.is_last() {
            return Err(AttemptError::LastQuestion);
        }
        let pending = attempt.pending(attempt.current).ok_or(AttemptError::NotAnswered)?;

        attempt.navigating = true;
        attempt.sync[attempt.current] = SyncStatus::InFlight;
        Ok(pending)
    }

    /// Returns `false` when the answer belonged to an attempt that is no
    /// longer current.
    pub fn complete_next(&mut self, pending: &PendingAnswer, synced: bool) -> bool {
        match &mut self.state {
            State::InProgress(attempt) if attempt.session == pending.session => {
                attempt.record_sync(pending.index, synced);
                if attempt.current == pending.index {
                    attempt.current += 1;
                }
                attempt.navigating = false;
                true
            }
            State::Submitting(attempt) if attempt.session == pending.session => {
                attempt.record_sync(pending.index, synced);
                attempt.navigating = false;
                true
            }
            _ => false,
        }
    }

    pub fn begin_finish(&mut self) -> Result<FinalizeJob, AttemptError> {
        let attempt = self.in_progress_mut()?;
        if attempt.navigating {
            return Err(AttemptError::Busy);
        }
        if !attempt.is_last() {
            return Err(AttemptError::NotLastQuestion);
        }
        if !attempt.current_answered() {
            return Err(AttemptError::NotAnswered);
        }

        self.enter_submitting(FinalizeMode::Manual)
    }

    /// Advances the countdown. Reaching zero moves the attempt into
    /// `Submitting` without the answered guard; later ticks are inactive.
    pub fn tick(&mut self, now: OffsetDateTime) -> TickOutcome {
        let tick = match &mut self.state {
            State::InProgress(attempt) => attempt.countdown.tick(now),
            _ => return TickOutcome::Inactive,
        };

        match tick {
            Tick::Disabled => TickOutcome::Disabled,
            Tick::Running { remaining } => TickOutcome::Running(remaining),
            Tick::AlreadyExpired => TickOutcome::Inactive,
            Tick::Expired => match self.enter_submitting(FinalizeMode::Deadline) {
                Ok(job) => TickOutcome::Expired(job),
                Err(_) => TickOutcome::Inactive,
            },
        }
    }

    pub fn begin_resync(&mut self) -> Result<Vec<PendingAnswer>, AttemptError> {
        let attempt = self.in_progress_mut()?;
        if attempt.navigating {
            return Err(AttemptError::Busy);
        }

        let mut pending = Vec::new();
        for index in 0..attempt.current {
            if attempt.sync[index] != SyncStatus::Failed {
                continue;
            }
            if let Some(answer) = attempt.pending(index) {
                attempt.sync[index] = SyncStatus::InFlight;
                pending.push(answer);
            }
        }

        if pending.is_empty() {
            return Err(AttemptError::NothingToRetry);
        }
        attempt.navigating = true;
        Ok(pending)
    }

    /// Records delivery of an answer sent outside [`begin_next`](Self::begin_next).
    pub fn record_answer_sync(&mut self, pending: &PendingAnswer, synced: bool) -> bool {
        match &mut self.state {
            State::InProgress(attempt) | State::Submitting(attempt)
                if attempt.session == pending.session =>
            {
                attempt.record_sync(pending.index, synced);
                true
            }
            _ => false,
        }
    }

    pub fn end_resync(&mut self, session: Uuid) {
        if let State::InProgress(attempt) | State::Submitting(attempt) = &mut self.state {
            if attempt.session == session {
                attempt.navigating = false;
            }
        }
    }

    pub fn complete_finalize(
        &mut self,
        session: Uuid,
        result: Result<(), ApiError>,
        now: OffsetDateTime,
    ) -> FinalizeResolution {
        let attempt = match &mut self.state {
            State::Submitting(attempt) if attempt.session == session => attempt,
            _ => return FinalizeResolution::Stale,
        };

        match result {
            Ok(()) => {
                let report = attempt.report(FinalSubmission::Recorded, now);
                self.state = State::Completed(report.clone());
                FinalizeResolution::Completed(report)
            }
            Err(err) if err.is_retryable() => {
                let message = err.to_string();
                attempt.finalizing = false;
                attempt.last_error = Some(message.clone());
                FinalizeResolution::Pending(message)
            }
            Err(err) => {
                let report = attempt.report(FinalSubmission::Rejected(err.to_string()), now);
                self.state = State::Completed(report.clone());
                FinalizeResolution::Rejected(report)
            }
        }
    }

    pub fn retry_finalize(&mut self) -> Result<FinalizeJob, AttemptError> {
        let attempt = match &mut self.state {
            State::Submitting(attempt) => attempt,
            _ => return Err(self.wrong_phase(AttemptPhase::Submitting)),
        };
        if attempt.finalizing {
            return Err(AttemptError::Busy);
        }
        if attempt.last_error.is_none() {
            return Err(AttemptError::NothingToRetry);
        }

        attempt.finalizing = true;
        attempt.last_error = None;
        let mode = attempt.mode.unwrap_or(FinalizeMode::Manual);
        Ok(attempt.finalize_job(mode))
    }

    pub fn snapshot(&self, now: OffsetDateTime) -> Option<PersistedAttempt> {
        self.attempt().map(|attempt| attempt.snapshot(&self.student_id, now))
    }

    pub fn view(&self) -> AttemptView {
        let attempt = self.attempt();
        let current_answer = attempt.map(|attempt| &attempt.answers[attempt.current]);
        let current_mode = match current_answer {
            Some(AnswerBuffer::Open { mode, .. }) => *mode,
            _ => None,
        };
        let sync = attempt.map(|attempt| attempt.sync.clone()).unwrap_or_default();
        let pending_sync = sync
            .iter()
            .filter(|status| matches!(status, SyncStatus::InFlight | SyncStatus::Failed))
            .count();

        AttemptView {
            phase: self.phase(),
            attempt_id: attempt.map(Attempt::id).or_else(|| self.report().map(|report| report.attempt_id)),
            assessment_id: self
                .assessment()
                .map(|assessment| assessment.id.clone())
                .or_else(|| self.report().map(|report| report.assessment_id.clone())),
            title: self.assessment().map(|assessment| assessment.title.clone()),
            current_index: attempt.map(Attempt::current_index),
            question: attempt.map(|attempt| attempt.current_question().clone()),
            current_answered: current_answer.is_some_and(AnswerBuffer::is_answered),
            current_mode,
            progress: self.progress(),
            remaining_seconds: attempt.and_then(Attempt::remaining_seconds),
            can_advance: self.can_advance(),
            can_finish: self.can_finish(),
            busy: attempt.is_some_and(|attempt| attempt.navigating || attempt.finalizing),
            sync,
            pending_sync,
            last_error: attempt.and_then(|attempt| attempt.last_error.clone()),
            report: self.report().cloned(),
        }
    }

    fn enter_submitting(&mut self, mode: FinalizeMode) -> Result<FinalizeJob, AttemptError> {
        let mut attempt = match std::mem::replace(&mut self.state, State::Idle) {
            State::InProgress(attempt) => attempt,
            other => {
                self.state = other;
                return Err(self.wrong_phase(AttemptPhase::InProgress));
            }
        };

        attempt.mode = Some(mode);
        attempt.finalizing = true;
        let job = attempt.finalize_job(mode);
        self.state = State::Submitting(attempt);
        Ok(job)
    }

    fn in_progress_mut(&mut self) -> Result<&mut Attempt, AttemptError> {
        let actual = self.phase();
        match &mut self.state {
            State::InProgress(attempt) => Ok(attempt),
            _ => Err(AttemptError::WrongPhase { expected: AttemptPhase::InProgress, actual }),
        }
    }

    fn editable(&mut self) -> Result<&mut Attempt, AttemptError> {
        let attempt = self.in_progress_mut()?;
        if attempt.navigating {
            return Err(AttemptError::Busy);
        }
        Ok(attempt)
    }

    fn wrong_phase(&self, expected: AttemptPhase) -> AttemptError {
        AttemptError::WrongPhase { expected, actual: self.phase() }
    }
}
