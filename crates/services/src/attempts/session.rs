use chrono::{DateTime, Utc};
use std::fmt;

use quiz_core::model::{
    AnswerMap, AnswerSheet, AttemptId, ChoiceId, QuestionId, Quiz, QuizQuestion, StudentId,
};

use super::progress::AttemptProgress;
use super::timer::Deadline;
use crate::error::AttemptError;

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Lifecycle of one attempt cycle.
///
/// `NotStarted → InProgress → Submitted`; a new cycle may begin again
/// (after `reset`) until the attempt policy says otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    NotStarted,
    InProgress,
    Submitted,
}

/// Everything the persister needs, captured at the moment of admission.
///
/// Producing a ticket *is* the `InProgress → Submitted` transition, so at
/// most one ticket exists per attempt no matter how many triggers race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    pub attempt_id: AttemptId,
    pub attempt_number: u32,
    pub answers: AnswerMap,
    pub submitted_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub auto_submitted: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state machine for a single quiz attempt.
///
/// Owns the loaded question set and the answer sheet. Nothing here does
/// I/O: the orchestration layer performs the start/finalize writes and
/// drives the transitions, so the transitions themselves are the only
/// admission control needed.
pub struct AttemptSession {
    quiz: Quiz,
    student_id: StudentId,
    questions: Vec<QuizQuestion>,
    state: AttemptState,
    attempt_id: Option<AttemptId>,
    attempt_number: Option<u32>,
    started_at: Option<DateTime<Utc>>,
    deadline: Option<Deadline>,
    answers: AnswerSheet,
}

impl AttemptSession {
    /// A fresh session over an already-loaded question set.
    #[must_use]
    pub fn new(quiz: Quiz, student_id: StudentId, questions: Vec<QuizQuestion>) -> Self {
        Self {
            quiz,
            student_id,
            questions,
            state: AttemptState::NotStarted,
            attempt_id: None,
            attempt_number: None,
            started_at: None,
            deadline: None,
            answers: AnswerSheet::new(),
        }
    }

    #[must_use]
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.state
    }

    #[must_use]
    pub fn attempt_id(&self) -> Option<AttemptId> {
        self.attempt_id
    }

    #[must_use]
    pub fn attempt_number(&self) -> Option<u32> {
        self.attempt_number
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    /// Seconds left before auto-submit, derived fresh from the stored
    /// absolute deadline. `None` for untimed or not-running attempts.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> Option<u64> {
        if self.state != AttemptState::InProgress {
            return None;
        }
        self.deadline.map(|d| d.remaining_seconds(now))
    }

    /// Returns a summary of the current attempt progress.
    #[must_use]
    pub fn progress(&self) -> AttemptProgress {
        AttemptProgress {
            total: self.questions.len(),
            answered: self.answers.answered_count(),
            unanswered: self.questions.len().saturating_sub(self.answers.answered_count()),
            is_submitted: self.state == AttemptState::Submitted,
        }
    }

    /// Guard used by the orchestrator before it creates the attempt row.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadyStarted` while in progress and
    /// `AttemptError::AlreadySubmitted` once submitted (reset first).
    pub fn ensure_not_started(&self) -> Result<(), AttemptError> {
        match self.state {
            AttemptState::NotStarted => Ok(()),
            AttemptState::InProgress => Err(AttemptError::AlreadyStarted),
            AttemptState::Submitted => Err(AttemptError::AlreadySubmitted),
        }
    }

    /// Enter `InProgress` once the attempt row exists.
    ///
    /// Resets the answer sheet and derives the absolute deadline from the
    /// quiz time limit, if there is one.
    ///
    /// # Errors
    ///
    /// Same guards as [`ensure_not_started`](Self::ensure_not_started).
    pub fn begin(
        &mut self,
        attempt_id: AttemptId,
        attempt_number: u32,
        started_at: DateTime<Utc>,
    ) -> Result<(), AttemptError> {
        self.ensure_not_started()?;
        self.attempt_id = Some(attempt_id);
        self.attempt_number = Some(attempt_number);
        self.started_at = Some(started_at);
        self.deadline = self
            .quiz
            .time_limit()
            .map(|limit| Deadline::new(started_at, limit));
        self.answers.clear();
        self.state = AttemptState::InProgress;
        Ok(())
    }

    /// Record a selection. Single-answer questions replace the selection
    /// (radio); multi-answer questions toggle membership (checkbox).
    /// Memory-only; nothing is written until submit.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` outside `InProgress`, and
    /// `UnknownQuestion`/`UnknownChoice` for selections that do not match
    /// the loaded question set.
    pub fn answer(&mut self, question: QuestionId, choice: ChoiceId) -> Result<(), AttemptError> {
        if self.state != AttemptState::InProgress {
            return Err(AttemptError::NotInProgress);
        }
        let Some(bundle) = self.questions.iter().find(|q| q.id() == question) else {
            return Err(AttemptError::UnknownQuestion(question));
        };
        if !bundle.has_choice(choice) {
            return Err(AttemptError::UnknownChoice { question, choice });
        }

        if bundle.is_multi_answer() {
            self.answers.toggle(question, choice);
        } else {
            self.answers.select_single(question, choice);
        }
        Ok(())
    }

    /// The single admission point for submission.
    ///
    /// Transitions to `Submitted` and hands back the one ticket the
    /// persister may act on; every later call — the losing trigger of a
    /// manual/deadline race included — gets `AlreadySubmitted`.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` before a start and
    /// `AttemptError::AlreadySubmitted` after the first admission.
    pub fn admit_submit(
        &mut self,
        now: DateTime<Utc>,
        auto: bool,
    ) -> Result<SubmitTicket, AttemptError> {
        match self.state {
            AttemptState::NotStarted => Err(AttemptError::NotInProgress),
            AttemptState::Submitted => Err(AttemptError::AlreadySubmitted),
            AttemptState::InProgress => {
                let attempt_id = self.attempt_id.ok_or(AttemptError::NotInProgress)?;
                let attempt_number = self.attempt_number.ok_or(AttemptError::NotInProgress)?;
                let started_at = self.started_at.ok_or(AttemptError::NotInProgress)?;

                self.state = AttemptState::Submitted;

                let elapsed = (now - started_at).num_seconds().max(1);
                let duration_seconds = u32::try_from(elapsed).unwrap_or(u32::MAX);

                Ok(SubmitTicket {
                    attempt_id,
                    attempt_number,
                    answers: self.answers.to_answer_map(),
                    submitted_at: now,
                    duration_seconds,
                    auto_submitted: auto,
                })
            }
        }
    }

    /// Abandon the running attempt, clearing in-memory state.
    ///
    /// Returns the orphaned attempt id so the orchestrator can try to
    /// delete the row; the session is back in `NotStarted` either way.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` outside `InProgress`.
    pub fn cancel(&mut self) -> Result<AttemptId, AttemptError> {
        if self.state != AttemptState::InProgress {
            return Err(AttemptError::NotInProgress);
        }
        let attempt_id = self.attempt_id.take().ok_or(AttemptError::NotInProgress)?;
        self.attempt_number = None;
        self.started_at = None;
        self.deadline = None;
        self.answers.clear();
        self.state = AttemptState::NotStarted;
        Ok(attempt_id)
    }

    /// Clear a submitted cycle so another attempt can start.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadyStarted` while an attempt is running.
    pub fn reset(&mut self) -> Result<(), AttemptError> {
        if self.state == AttemptState::InProgress {
            return Err(AttemptError::AlreadyStarted);
        }
        self.attempt_id = None;
        self.attempt_number = None;
        self.started_at = None;
        self.deadline = None;
        self.answers.clear();
        self.state = AttemptState::NotStarted;
        Ok(())
    }
}

impl fmt::Debug for AttemptSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttemptSession")
            .field("quiz_id", &self.quiz.id())
            .field("student_id", &self.student_id)
            .field("questions_len", &self.questions.len())
            .field("state", &self.state)
            .field("attempt_id", &self.attempt_id)
            .field("attempt_number", &self.attempt_number)
            .field("started_at", &self.started_at)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
