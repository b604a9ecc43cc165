use std::sync::Arc;

use quiz_core::Clock;
use quiz_core::model::{AttemptId, AttemptMeta, Quiz, QuizId, QuizQuestion, StudentId};
use quiz_core::review::{self, QuestionReview};
use quiz_core::scoring;
use storage::repository::{
    AttemptFinalization, AttemptRepository, NewAttempt, QuestionRepository, QuizRepository,
    Storage, StorageError,
};

use super::history::AttemptHistory;
use super::loader::QuestionBank;
use super::session::AttemptSession;
use super::timer::Deadline;
use crate::error::{AttemptError, LoadError};

/// How many times a start recomputes its attempt number after losing a
/// uniqueness race to another tab or device.
const START_CONFLICT_RETRIES: u32 = 3;

/// Result of a successful start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartReceipt {
    pub attempt_id: AttemptId,
    pub attempt_number: u32,
    pub deadline: Option<Deadline>,
}

/// Result of the one admitted submission.
///
/// `saved == false` means the finalize write failed after the admission
/// had already fired: the attempt stays submitted locally and the UI
/// warns that the result may not be saved. There is no retry path.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub attempt_id: AttemptId,
    pub attempt_number: u32,
    pub score: u32,
    pub auto_submitted: bool,
    pub saved: bool,
    pub review: Vec<QuestionReview>,
}

/// Orchestrates loading, starting, submitting and cancelling attempts
/// against the repositories.
#[derive(Clone)]
pub struct AttemptService {
    clock: Clock,
    quizzes: Arc<dyn QuizRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptService {
    #[must_use]
    pub fn new(
        clock: Clock,
        quizzes: Arc<dyn QuizRepository>,
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            clock,
            quizzes,
            questions,
            attempts,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.quizzes),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.attempts),
        )
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Fetch quiz metadata.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::QuizNotFound` for a missing quiz, or storage
    /// failures.
    pub async fn load_quiz(&self, quiz_id: QuizId) -> Result<Quiz, LoadError> {
        self.quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or(LoadError::QuizNotFound(quiz_id))
    }

    /// Load the question bank, degrading fetch failures to "no
    /// questions".
    pub async fn load_questions(&self, quiz: &Quiz) -> (Vec<QuizQuestion>, Option<LoadError>) {
        QuestionBank::load_or_empty(quiz, self.questions.as_ref()).await
    }

    /// Attempt history for one (quiz, student) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    pub async fn load_history(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<AttemptHistory, StorageError> {
        let attempts = self.attempts.list_attempts(quiz_id, student_id).await?;
        Ok(AttemptHistory::from_attempts(attempts))
    }

    /// Assemble a fresh session for a student: quiz, question bank and
    /// history in one round trip, with the load degrade applied.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` when the quiz itself or the history cannot be
    /// fetched; a failed *question* fetch is returned as the warning
    /// element instead.
    pub async fn open_session(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<(AttemptSession, AttemptHistory, Option<LoadError>), LoadError> {
        let quiz = self.load_quiz(quiz_id).await?;
        let (questions, load_warning) = self.load_questions(&quiz).await;
        let history = self.load_history(quiz_id, student_id).await?;
        let session = AttemptSession::new(quiz, student_id, questions);
        Ok((session, history, load_warning))
    }

    /// Start a new attempt: check the policy, take the next attempt
    /// number, create the shell row, and move the session to
    /// `InProgress`.
    ///
    /// Loses of the attempt-number uniqueness race are retried a bounded
    /// number of times with a recounted history. On any failure the
    /// session remains `NotStarted` and the caller may retry.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Denied` for policy denials,
    /// `AlreadyStarted`/`AlreadySubmitted` for state violations, and
    /// `Storage` for persistence failures.
    pub async fn start(&self, session: &mut AttemptSession) -> Result<StartReceipt, AttemptError> {
        session.ensure_not_started()?;
        let now = self.clock.now();
        let quiz_id = session.quiz().id();
        let student_id = session.student_id();

        let mut history = self.load_history(quiz_id, student_id).await?;

        for _ in 0..START_CONFLICT_RETRIES {
            if let Some(denied) = history.start_denial(session.quiz(), now) {
                return Err(AttemptError::Denied(denied));
            }

            let attempt_number = history.next_attempt_number();
            let new = NewAttempt {
                quiz_id,
                student_id,
                attempt_number,
                started_at: now,
            };
            match self.attempts.create_attempt(&new).await {
                Ok(attempt_id) => {
                    session.begin(attempt_id, attempt_number, now)?;
                    return Ok(StartReceipt {
                        attempt_id,
                        attempt_number,
                        deadline: session.deadline(),
                    });
                }
                Err(StorageError::Conflict) => {
                    tracing::warn!(
                        %quiz_id,
                        attempt_number,
                        "attempt number taken by a concurrent start, recounting"
                    );
                    history = self.load_history(quiz_id, student_id).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(AttemptError::Storage(StorageError::Conflict))
    }

    /// The one finalize per attempt: admit, score, persist.
    ///
    /// Admission happens first and is the idempotency guarantee — a
    /// manual click racing the deadline executes this path at most once.
    /// A failed finalize write is reported via `saved`, not retried; the
    /// session stays `Submitted`.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress`/`AlreadySubmitted` when the
    /// admission is refused.
    pub async fn submit(
        &self,
        session: &mut AttemptSession,
        auto: bool,
    ) -> Result<SubmitReceipt, AttemptError> {
        let now = self.clock.now();
        let ticket = session.admit_submit(now, auto)?;

        let score = scoring::score_answers(session.questions(), &ticket.answers);
        let finalization = AttemptFinalization {
            submitted_at: ticket.submitted_at,
            duration_seconds: ticket.duration_seconds,
            score,
            meta: AttemptMeta {
                answers: ticket.answers.clone(),
                auto_submitted: ticket.auto_submitted,
            },
        };

        let saved = match self
            .attempts
            .finalize_attempt(ticket.attempt_id, &finalization)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(
                    attempt_id = %ticket.attempt_id,
                    error = %err,
                    "finalize failed; submission may not be saved"
                );
                false
            }
        };

        let review = review::reconstruct(
            session.questions(),
            &ticket.answers,
            session.quiz().settings().reveal_correct_answers(),
        );

        Ok(SubmitReceipt {
            attempt_id: ticket.attempt_id,
            attempt_number: ticket.attempt_number,
            score,
            auto_submitted: ticket.auto_submitted,
            saved,
            review,
        })
    }

    /// Discard the running attempt without counting it as used.
    ///
    /// Deletion is best-effort: a failed delete leaves an orphaned row
    /// behind (which will then count toward the cap) and is only logged.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` outside `InProgress`.
    pub async fn cancel(&self, session: &mut AttemptSession) -> Result<(), AttemptError> {
        let attempt_id = session.cancel()?;
        if let Err(err) = self.attempts.delete_attempt(attempt_id).await {
            tracing::warn!(
                %attempt_id,
                error = %err,
                "discarding attempt row failed; orphan left behind"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quiz_core::model::QuizSettings;
    use quiz_core::time::{fixed_clock, fixed_now};
    use storage::repository::InMemoryRepository;
    use uuid::Uuid;

    fn student() -> StudentId {
        StudentId::new(Uuid::from_u128(21))
    }

    async fn seed_quiz(repo: &InMemoryRepository, max_attempts: u32) -> Quiz {
        let settings = QuizSettings::new(max_attempts).unwrap().published(true);
        let quiz = Quiz::new(QuizId::new(1), "Workflow quiz", None, settings).unwrap();
        repo.upsert_quiz(&quiz).await.unwrap();
        quiz
    }

    fn service(repo: &InMemoryRepository) -> AttemptService {
        AttemptService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    /// Simulates another tab winning the numbering race: the first
    /// create steals the number into the inner repository and reports a
    /// conflict, exactly what the unique index produces.
    struct RacingRepo {
        inner: InMemoryRepository,
        raced: std::sync::Mutex<bool>,
    }

    #[async_trait]
    impl AttemptRepository for RacingRepo {
        async fn list_attempts(
            &self,
            quiz_id: QuizId,
            student_id: StudentId,
        ) -> Result<Vec<quiz_core::model::Attempt>, StorageError> {
            self.inner.list_attempts(quiz_id, student_id).await
        }

        async fn get_attempt(
            &self,
            id: AttemptId,
        ) -> Result<Option<quiz_core::model::Attempt>, StorageError> {
            self.inner.get_attempt(id).await
        }

        async fn create_attempt(&self, new: &NewAttempt) -> Result<AttemptId, StorageError> {
            let first = {
                let mut raced = self.raced.lock().unwrap();
                if !*raced {
                    *raced = true;
                    true
                } else {
                    false
                }
            };
            if first {
                self.inner.create_attempt(new).await?;
                return Err(StorageError::Conflict);
            }
            self.inner.create_attempt(new).await
        }

        async fn finalize_attempt(
            &self,
            id: AttemptId,
            finalization: &AttemptFinalization,
        ) -> Result<(), StorageError> {
            self.inner.finalize_attempt(id, finalization).await
        }

        async fn delete_attempt(&self, id: AttemptId) -> Result<(), StorageError> {
            self.inner.delete_attempt(id).await
        }
    }

    #[tokio::test]
    async fn start_assigns_first_attempt_number() {
        let repo = InMemoryRepository::new();
        let quiz = seed_quiz(&repo, 3).await;
        let service = service(&repo);

        let mut session = AttemptSession::new(quiz, student(), Vec::new());
        let receipt = service.start(&mut session).await.unwrap();

        assert_eq!(receipt.attempt_number, 1);
        assert_eq!(receipt.deadline, None);
        assert_eq!(session.started_at(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn start_retries_after_numbering_conflict() {
        let repo = InMemoryRepository::new();
        let quiz = seed_quiz(&repo, 3).await;
        let racing = Arc::new(RacingRepo {
            inner: repo.clone(),
            raced: std::sync::Mutex::new(false),
        });
        let service = AttemptService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            racing,
        );

        let mut session = AttemptSession::new(quiz, student(), Vec::new());
        let receipt = service.start(&mut session).await.unwrap();

        // the racing tab took number 1; the retry recounted and took 2
        assert_eq!(receipt.attempt_number, 2);
        let attempts = repo.list_attempts(QuizId::new(1), student()).await.unwrap();
        assert_eq!(attempts.len(), 2);
    }

    #[tokio::test]
    async fn start_denied_when_unpublished() {
        let repo = InMemoryRepository::new();
        let settings = QuizSettings::new(1).unwrap();
        let quiz = Quiz::new(QuizId::new(1), "Draft", None, settings).unwrap();
        repo.upsert_quiz(&quiz).await.unwrap();
        let service = service(&repo);

        let mut session = AttemptSession::new(quiz, student(), Vec::new());
        let err = service.start(&mut session).await.unwrap_err();
        assert!(matches!(
            err,
            AttemptError::Denied(crate::error::StartDenied::NotPublished)
        ));
        assert_eq!(
            session.state(),
            super::super::session::AttemptState::NotStarted
        );
    }

    #[tokio::test]
    async fn cancel_swallows_a_failed_delete() {
        let repo = InMemoryRepository::new();
        let quiz = seed_quiz(&repo, 3).await;
        let service = service(&repo);

        let mut session = AttemptSession::new(quiz, student(), Vec::new());
        let receipt = service.start(&mut session).await.unwrap();

        // delete out from under the service so its own delete fails
        repo.delete_attempt(receipt.attempt_id).await.unwrap();
        service.cancel(&mut session).await.unwrap();
        assert_eq!(
            session.state(),
            super::super::session::AttemptState::NotStarted
        );
    }
}
