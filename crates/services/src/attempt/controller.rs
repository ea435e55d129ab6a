use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use quiz_core::Clock;
use quiz_core::model::{
    AttemptId, AttemptResult, AttemptStatus, AttemptTrigger, NewAttemptResult, Question,
    QuestionId, QuizId,
};
use quiz_core::scoring::{self, AnswerReview, Answers};
use storage::repository::{ResultStore, StorageError};
use tokio::sync::watch;
use tracing::Instrument;

use super::gate::{GateOutcome, SubmissionGate};
use super::timer::Timer;
use crate::config::AttemptConfig;
use crate::error::AttemptError;
use crate::retry::retry_while;

/// What a call to [`SessionController::submit`] achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// This call scored and stored the attempt.
    Recorded(AttemptResult),
    /// The attempt had already been stored; nothing was written.
    AlreadySubmitted(AttemptResult),
    /// Another submission is in flight and owns the write.
    Superseded,
}

impl SubmitOutcome {
    #[must_use]
    pub fn result(&self) -> Option<&AttemptResult> {
        match self {
            Self::Recorded(result) | Self::AlreadySubmitted(result) => Some(result),
            Self::Superseded => None,
        }
    }

    #[must_use]
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }
}

#[derive(Debug, Default)]
struct AttemptState {
    student_name: String,
    answers: Answers,
    /// Scored result waiting to be written.
    pending: Option<NewAttemptResult>,
    result: Option<AttemptResult>,
    review: Vec<AnswerReview>,
    failed_writes: u32,
    failure: Option<String>,
}

/// One student's live attempt at a quiz.
///
/// Owns the answer map, the countdown and the submission gate. Manual submit
/// and timer expiry race through the gate; the winner scores a snapshot of the
/// answers and writes exactly one result.
///
/// Always handled through an `Arc` so the countdown can reach back into it.
pub struct SessionController {
    id: AttemptId,
    quiz_id: QuizId,
    config: AttemptConfig,
    clock: Clock,
    results: Arc<dyn ResultStore>,
    gate: SubmissionGate,
    questions: OnceLock<Vec<Question>>,
    deadline: OnceLock<DateTime<Utc>>,
    state: Mutex<AttemptState>,
    timer: Mutex<Option<Timer>>,
    /// Held for the whole scoring and write step; at most one writer at a time.
    write_slot: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.id)
            .field("quiz_id", &self.quiz_id)
            .field("status", &self.gate.status())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionController {
    #[must_use]
    pub fn new(
        quiz_id: QuizId,
        config: AttemptConfig,
        clock: Clock,
        results: Arc<dyn ResultStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: AttemptId::generate(),
            quiz_id,
            config,
            clock,
            results,
            gate: SubmissionGate::new(),
            questions: OnceLock::new(),
            deadline: OnceLock::new(),
            state: Mutex::new(AttemptState::default()),
            timer: Mutex::new(None),
            write_slot: tokio::sync::Mutex::new(()),
        })
    }

    /// Take a snapshot of `questions`, start the countdown and accept answers.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidQuiz` when `questions` is empty (the
    /// attempt stays `Created`) and `AttemptError::AlreadyStarted` on a second call.
    pub fn start(self: &Arc<Self>, questions: Vec<Question>) -> Result<(), AttemptError> {
        if questions.is_empty() {
            return Err(AttemptError::InvalidQuiz {
                quiz_id: self.quiz_id,
            });
        }
        let count = questions.len();
        self.questions
            .set(questions)
            .map_err(|_| AttemptError::AlreadyStarted)?;

        if let Some(deadline) = chrono::Duration::from_std(self.config.duration())
            .ok()
            .and_then(|d| self.clock.now().checked_add_signed(d))
        {
            let _ = self.deadline.set(deadline);
        }

        // Activation and arming happen under the timer lock so a submit that
        // races with start always finds the timer it has to cancel.
        let mut timer = lock(&self.timer);
        self.gate
            .advance(AttemptStatus::Created, AttemptStatus::Active)
            .map_err(|_| AttemptError::AlreadyStarted)?;
        *timer = Some(self.arm_timer());
        drop(timer);

        tracing::info!(
            attempt_id = %self.id,
            quiz_id = %self.quiz_id,
            questions = count,
            duration_secs = self.config.duration().as_secs(),
            "attempt started"
        );
        Ok(())
    }

    fn arm_timer(self: &Arc<Self>) -> Timer {
        let weak: Weak<Self> = Arc::downgrade(self);
        let span = tracing::info_span!("attempt_timer", attempt_id = %self.id);
        Timer::start(
            self.config.duration_ticks,
            self.config.tick,
            move || {
                async move {
                    if let Some(controller) = weak.upgrade() {
                        controller.expire().await;
                    }
                }
                .instrument(span)
            },
        )
    }

    /// Submit on behalf of the countdown, retrying transient write failures.
    async fn expire(&self) {
        let outcome = retry_while(
            self.config.expiry_retry.clone(),
            || self.submit(AttemptTrigger::TimerExpiry),
            AttemptError::is_retryable,
        )
        .await;

        match outcome {
            Ok(SubmitOutcome::Recorded(result)) => {
                tracing::info!(result_id = %result.id(), "time expired; attempt submitted");
            }
            Ok(_) => tracing::debug!("time expired after attempt was already submitted"),
            Err(err) => tracing::error!(error = %err, "automatic submission failed"),
        }
    }

    fn cancel_timer(&self) {
        if let Some(timer) = lock(&self.timer).as_ref() {
            timer.cancel();
        }
    }

    fn is_active(&self) -> bool {
        self.gate.status() == AttemptStatus::Active
    }

    /// Record the selected option for a question, replacing any earlier choice.
    ///
    /// Ignored unless the attempt is `Active` and the question belongs to it.
    /// Returns whether the answer was recorded.
    pub fn select_answer(&self, question_id: QuestionId, option: impl Into<String>) -> bool {
        let known = self
            .questions()
            .iter()
            .any(|question| question.id() == question_id);
        let mut state = lock(&self.state);
        // Checked under the state lock: the submitter snapshots under the same lock.
        if !known || !self.is_active() {
            tracing::debug!(attempt_id = %self.id, %question_id, "answer ignored");
            return false;
        }
        state.answers.insert(question_id, option.into());
        true
    }

    /// Set the name the result will be stored under. Ignored unless `Active`.
    pub fn set_student_name(&self, name: impl Into<String>) -> bool {
        let mut state = lock(&self.state);
        if !self.is_active() {
            return false;
        }
        state.student_name = name.into();
        true
    }

    /// Drop every recorded answer. Ignored unless `Active`.
    pub fn clear_answers(&self) -> bool {
        let mut state = lock(&self.state);
        if !self.is_active() {
            return false;
        }
        state.answers.clear();
        true
    }

    /// Score and store the attempt.
    ///
    /// Manual and expiry submissions may race: exactly one of them writes the
    /// result, the other gets `Superseded` or `AlreadySubmitted`. Calling again
    /// after a successful submit returns the stored result without writing.
    ///
    /// # Errors
    ///
    /// * `Validation` for a manual submit without a student name.
    /// * `NotStarted` before [`SessionController::start`].
    /// * `Persistence` when a write failed but may be retried by calling again.
    /// * `Failed` once writes are exhausted or refused.
    pub async fn submit(&self, trigger: AttemptTrigger) -> Result<SubmitOutcome, AttemptError> {
        let span = tracing::info_span!(
            "submit",
            attempt_id = %self.id,
            quiz_id = %self.quiz_id,
            %trigger
        );
        self.submit_inner(trigger).instrument(span).await
    }

    async fn submit_inner(&self, trigger: AttemptTrigger) -> Result<SubmitOutcome, AttemptError> {
        match self.gate.status() {
            AttemptStatus::Created => Err(AttemptError::NotStarted),
            AttemptStatus::Submitted => Ok(self.already_submitted()),
            AttemptStatus::Failed => Err(self.failed()),
            AttemptStatus::Submitting => self.resume(trigger).await,
            AttemptStatus::Active => {
                if trigger == AttemptTrigger::Manual && self.student_name().trim().is_empty() {
                    return Err(AttemptError::Validation);
                }
                match self.gate.try_begin_submit() {
                    GateOutcome::Won => {
                        self.cancel_timer();
                        let slot = self.write_slot.lock().await;
                        match self.score_snapshot() {
                            Ok(draft) => self.write(slot, draft).await,
                            Err(err) => Err(self.fail(&err.to_string())),
                        }
                    }
                    GateOutcome::Lost(AttemptStatus::Submitted) => Ok(self.already_submitted()),
                    GateOutcome::Lost(AttemptStatus::Failed) => Err(self.failed()),
                    GateOutcome::Lost(observed) => {
                        tracing::debug!(%observed, "lost submission race");
                        Ok(SubmitOutcome::Superseded)
                    }
                }
            }
        }
    }

    /// Retry a write left pending by an earlier failure, unless a writer is busy.
    async fn resume(&self, trigger: AttemptTrigger) -> Result<SubmitOutcome, AttemptError> {
        let Ok(slot) = self.write_slot.try_lock() else {
            return Ok(SubmitOutcome::Superseded);
        };
        match self.gate.status() {
            AttemptStatus::Submitted => return Ok(self.already_submitted()),
            AttemptStatus::Failed => return Err(self.failed()),
            _ => {}
        }
        let pending = lock(&self.state).pending.clone();
        match pending {
            Some(draft) => {
                tracing::info!(%trigger, "retrying result write");
                self.write(slot, draft).await
            }
            // The winner has not scored yet and will write itself.
            None => Ok(SubmitOutcome::Superseded),
        }
    }

    /// Freeze the answers and build the result to store.
    fn score_snapshot(&self) -> Result<NewAttemptResult, AttemptError> {
        let questions = self.questions();
        let mut state = lock(&self.state);
        let score = scoring::score(questions, &state.answers);
        state.review = scoring::review(questions, &state.answers);

        let name = match state.student_name.trim() {
            "" => self.config.fallback_student_name().to_owned(),
            name => name.to_owned(),
        };
        let draft = NewAttemptResult::new(
            self.quiz_id,
            name,
            score.score,
            score.total,
            self.clock.now(),
        )?;
        tracing::debug!(score = score.score, total = score.total, "attempt scored");
        state.pending = Some(draft.clone());
        Ok(draft)
    }

    async fn write(
        &self,
        slot: tokio::sync::MutexGuard<'_, ()>,
        draft: NewAttemptResult,
    ) -> Result<SubmitOutcome, AttemptError> {
        let timeout = self.config.persist_timeout;
        let err = match tokio::time::timeout(timeout, self.results.insert_result(&draft)).await {
            Ok(Ok(stored)) => {
                {
                    let mut state = lock(&self.state);
                    state.result = Some(stored.clone());
                    state.pending = None;
                }
                let _ = self
                    .gate
                    .advance(AttemptStatus::Submitting, AttemptStatus::Submitted);
                drop(slot);
                tracing::info!(
                    result_id = %stored.id(),
                    score = stored.score(),
                    total = stored.total(),
                    "attempt submitted"
                );
                return Ok(SubmitOutcome::Recorded(stored));
            }
            Ok(Err(err)) => err,
            Err(_) => StorageError::Unavailable(format!(
                "result write timed out after {}ms",
                timeout.as_millis()
            )),
        };

        let attempt = {
            let mut state = lock(&self.state);
            state.failed_writes += 1;
            state.failed_writes
        };

        if err.is_transient() && attempt < self.config.max_persist_attempts {
            tracing::warn!(error = %err, attempt, "result write failed; submission can be retried");
            return Err(AttemptError::Persistence {
                attempt,
                source: err,
            });
        }

        tracing::warn!(error = %err, attempt, "giving up on result write");
        Err(self.fail(&err.to_string()))
    }

    /// Close a `Submitting` attempt without a stored result.
    fn fail(&self, reason: &str) -> AttemptError {
        lock(&self.state).failure = Some(reason.to_owned());
        let _ = self
            .gate
            .advance(AttemptStatus::Submitting, AttemptStatus::Failed);
        tracing::error!(error = %reason, "result could not be stored; attempt failed");
        AttemptError::Failed {
            reason: reason.to_owned(),
        }
    }

    fn already_submitted(&self) -> SubmitOutcome {
        lock(&self.state)
            .result
            .clone()
            .map_or(SubmitOutcome::Superseded, SubmitOutcome::AlreadySubmitted)
    }

    fn failed(&self) -> AttemptError {
        let reason = lock(&self.state)
            .failure
            .clone()
            .unwrap_or_else(|| "result was not stored".to_owned());
        AttemptError::Failed { reason }
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.gate.status()
    }

    /// Watch status transitions, e.g. to close the UI when time runs out.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AttemptStatus> {
        self.gate.subscribe()
    }

    /// Question snapshot taken at start; empty before that.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        self.questions.get().map(Vec::as_slice).unwrap_or_default()
    }

    #[must_use]
    pub fn answers(&self) -> Answers {
        lock(&self.state).answers.clone()
    }

    #[must_use]
    pub fn student_name(&self) -> String {
        lock(&self.state).student_name.clone()
    }

    /// Wall-clock time at which the countdown ends.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline.get().copied()
    }

    /// Time left on the countdown; zero once it has fired or been cancelled.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        match lock(&self.timer).as_ref() {
            Some(timer) if !timer.is_cancelled() => timer.remaining(),
            _ => Duration::ZERO,
        }
    }

    /// Stored result once the attempt is `Submitted`.
    #[must_use]
    pub fn result(&self) -> Option<AttemptResult> {
        lock(&self.state).result.clone()
    }

    /// Scored result that has not been written yet, e.g. after the attempt failed.
    #[must_use]
    pub fn unsaved_result(&self) -> Option<NewAttemptResult> {
        lock(&self.state).pending.clone()
    }

    /// Per-question breakdown, available once the attempt has been scored.
    #[must_use]
    pub fn answer_review(&self) -> Option<Vec<AnswerReview>> {
        match self.gate.status() {
            AttemptStatus::Submitted | AttemptStatus::Failed => {
                Some(lock(&self.state).review.clone())
            }
            _ => None,
        }
    }
}
