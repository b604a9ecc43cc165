use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    Attempt, AttemptId, AttemptMeta, Choice, ChoiceId, Question, QuestionId, Quiz, QuizId,
    StudentId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Fields the engine supplies when creating the shell row for a new
/// attempt. Everything else (submission, duration, score, meta) is
/// written later by the single finalize.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub quiz_id: QuizId,
    pub student_id: StudentId,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
}

/// The one-shot finalize payload for an attempt.
#[derive(Debug, Clone)]
pub struct AttemptFinalization {
    pub submitted_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub score: u32,
    pub meta: AttemptMeta,
}

/// Repository contract for quiz metadata.
#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// Persist or update a quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the quiz cannot be stored.
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError>;

    /// Fetch a quiz by ID; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError>;
}

/// Repository contract for the question bank.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Persist or update a question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError>;

    /// Persist or update a choice.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the choice cannot be stored.
    async fn upsert_choice(&self, choice: &Choice) -> Result<(), StorageError>;

    /// Questions of a quiz ordered by `order_index`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError>;

    /// Choices of the given questions, ordered by question and then by
    /// `order_index` within each question.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_choices(&self, question_ids: &[QuestionId])
    -> Result<Vec<Choice>, StorageError>;
}

/// Repository contract for attempts.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// All attempts for a quiz and student, newest attempt number first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn list_attempts(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<Vec<Attempt>, StorageError>;

    /// Fetch a single attempt; `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failures.
    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError>;

    /// Insert the shell row for a freshly started attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the (quiz, student,
    /// attempt_number) triple is already taken, so callers can recompute
    /// the number and retry.
    async fn create_attempt(&self, new: &NewAttempt) -> Result<AttemptId, StorageError>;

    /// Write the finalize payload onto an existing attempt row.
    ///
    /// This is a plain write: at-most-once semantics come from the
    /// attempt session's state transition, not from the store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row is missing.
    async fn finalize_attempt(
        &self,
        id: AttemptId,
        finalization: &AttemptFinalization,
    ) -> Result<(), StorageError>;

    /// Delete an attempt row (the cancel path).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row is missing.
    async fn delete_attempt(&self, id: AttemptId) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

#[derive(Default)]
struct AttemptTable {
    rows: HashMap<AttemptId, Attempt>,
    next_id: i64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    quizzes: Arc<Mutex<HashMap<QuizId, Quiz>>>,
    questions: Arc<Mutex<HashMap<QuestionId, Question>>>,
    choices: Arc<Mutex<HashMap<ChoiceId, Choice>>>,
    attempts: Arc<Mutex<AttemptTable>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn upsert_quiz(&self, quiz: &Quiz) -> Result<(), StorageError> {
        let mut guard = self.quizzes.lock().map_err(lock_err)?;
        guard.insert(quiz.id(), quiz.clone());
        Ok(())
    }

    async fn get_quiz(&self, id: QuizId) -> Result<Option<Quiz>, StorageError> {
        let guard = self.quizzes.lock().map_err(lock_err)?;
        Ok(guard.get(&id).cloned())
    }
}

#[async_trait]
impl QuestionRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &Question) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(lock_err)?;
        guard.insert(question.id(), question.clone());
        Ok(())
    }

    async fn upsert_choice(&self, choice: &Choice) -> Result<(), StorageError> {
        let mut guard = self.choices.lock().map_err(lock_err)?;
        guard.insert(choice.id(), choice.clone());
        Ok(())
    }

    async fn list_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(lock_err)?;
        let mut questions: Vec<Question> = guard
            .values()
            .filter(|q| q.quiz_id() == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.order_index(), q.id().value()));
        Ok(questions)
    }

    async fn list_choices(
        &self,
        question_ids: &[QuestionId],
    ) -> Result<Vec<Choice>, StorageError> {
        let guard = self.choices.lock().map_err(lock_err)?;
        let mut choices: Vec<Choice> = guard
            .values()
            .filter(|c| question_ids.contains(&c.question_id()))
            .cloned()
            .collect();
        choices.sort_by_key(|c| (c.question_id().value(), c.order_index(), c.id().value()));
        Ok(choices)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn list_attempts(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<Vec<Attempt>, StorageError> {
        let guard = self.attempts.lock().map_err(lock_err)?;
        let mut attempts: Vec<Attempt> = guard
            .rows
            .values()
            .filter(|a| a.quiz_id() == quiz_id && a.student_id() == student_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.attempt_number().cmp(&a.attempt_number()));
        Ok(attempts)
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StorageError> {
        let guard = self.attempts.lock().map_err(lock_err)?;
        Ok(guard.rows.get(&id).cloned())
    }

    async fn create_attempt(&self, new: &NewAttempt) -> Result<AttemptId, StorageError> {
        let mut guard = self.attempts.lock().map_err(lock_err)?;
        let duplicate = guard.rows.values().any(|a| {
            a.quiz_id() == new.quiz_id
                && a.student_id() == new.student_id
                && a.attempt_number() == new.attempt_number
        });
        if duplicate {
            return Err(StorageError::Conflict);
        }

        guard.next_id += 1;
        let id = AttemptId::new(guard.next_id);
        let attempt = Attempt::started(
            id,
            new.quiz_id,
            new.student_id,
            new.attempt_number,
            new.started_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.rows.insert(id, attempt);
        Ok(id)
    }

    async fn finalize_attempt(
        &self,
        id: AttemptId,
        finalization: &AttemptFinalization,
    ) -> Result<(), StorageError> {
        let mut guard = self.attempts.lock().map_err(lock_err)?;
        let row = guard.rows.get(&id).ok_or(StorageError::NotFound)?;
        let finalized = Attempt::from_persisted(
            row.id(),
            row.quiz_id(),
            row.student_id(),
            row.attempt_number(),
            row.started_at(),
            Some(finalization.submitted_at),
            finalization.duration_seconds,
            finalization.score,
            Some(finalization.meta.clone()),
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.rows.insert(id, finalized);
        Ok(())
    }

    async fn delete_attempt(&self, id: AttemptId) -> Result<(), StorageError> {
        let mut guard = self.attempts.lock().map_err(lock_err)?;
        guard
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or(StorageError::NotFound)
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub quizzes: Arc<dyn QuizRepository>,
    pub questions: Arc<dyn QuestionRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let quizzes: Arc<dyn QuizRepository> = Arc::new(repo.clone());
        let questions: Arc<dyn QuestionRepository> = Arc::new(repo.clone());
        let attempts: Arc<dyn AttemptRepository> = Arc::new(repo);
        Self {
            quizzes,
            questions,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::QuizSettings;
    use quiz_core::time::fixed_now;
    use uuid::Uuid;

    fn build_quiz(id: u64) -> Quiz {
        Quiz::new(
            QuizId::new(id),
            format!("Quiz {id}"),
            None,
            QuizSettings::new(3).unwrap().published(true),
        )
        .unwrap()
    }

    fn student() -> StudentId {
        StudentId::new(Uuid::from_u128(11))
    }

    fn new_attempt(number: u32) -> NewAttempt {
        NewAttempt {
            quiz_id: QuizId::new(1),
            student_id: student(),
            attempt_number: number,
            started_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn round_trips_quiz() {
        let repo = InMemoryRepository::new();
        let quiz = build_quiz(1);
        repo.upsert_quiz(&quiz).await.unwrap();

        let fetched = repo.get_quiz(quiz.id()).await.unwrap();
        assert_eq!(fetched, Some(quiz));
        assert_eq!(repo.get_quiz(QuizId::new(99)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn lists_questions_and_choices_in_stored_order() {
        let repo = InMemoryRepository::new();
        for (id, order) in [(1_u64, 1_u32), (2, 0)] {
            let question =
                Question::new(QuestionId::new(id), QuizId::new(1), order, "Q?", 1).unwrap();
            repo.upsert_question(&question).await.unwrap();
        }
        for (id, question, order) in [(10_u64, 1_u64, 1_u32), (11, 1, 0), (20, 2, 0)] {
            let choice = Choice::new(
                ChoiceId::new(id),
                QuestionId::new(question),
                order,
                "A",
                false,
            )
            .unwrap();
            repo.upsert_choice(&choice).await.unwrap();
        }

        let questions = repo.list_questions(QuizId::new(1)).await.unwrap();
        let ids: Vec<u64> = questions.iter().map(|q| q.id().value()).collect();
        assert_eq!(ids, vec![2, 1]);

        let choices = repo
            .list_choices(&[QuestionId::new(1)])
            .await
            .unwrap();
        let ids: Vec<u64> = choices.iter().map(|c| c.id().value()).collect();
        assert_eq!(ids, vec![11, 10]);
    }

    #[tokio::test]
    async fn duplicate_attempt_number_conflicts() {
        let repo = InMemoryRepository::new();
        repo.create_attempt(&new_attempt(1)).await.unwrap();

        let err = repo.create_attempt(&new_attempt(1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn attempts_list_newest_number_first() {
        let repo = InMemoryRepository::new();
        for number in 1..=3 {
            repo.create_attempt(&new_attempt(number)).await.unwrap();
        }

        let attempts = repo.list_attempts(QuizId::new(1), student()).await.unwrap();
        let numbers: Vec<u32> = attempts.iter().map(Attempt::attempt_number).collect();
        assert_eq!(numbers, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn finalize_then_delete() {
        let repo = InMemoryRepository::new();
        let id = repo.create_attempt(&new_attempt(1)).await.unwrap();

        let finalization = AttemptFinalization {
            submitted_at: fixed_now(),
            duration_seconds: 42,
            score: 2,
            meta: AttemptMeta {
                answers: Default::default(),
                auto_submitted: false,
            },
        };
        repo.finalize_attempt(id, &finalization).await.unwrap();

        let attempt = repo.get_attempt(id).await.unwrap().unwrap();
        assert!(attempt.is_submitted());
        assert_eq!(attempt.score(), 2);
        assert_eq!(attempt.duration_seconds(), 42);

        repo.delete_attempt(id).await.unwrap();
        assert!(matches!(
            repo.delete_attempt(id).await.unwrap_err(),
            StorageError::NotFound
        ));
    }
}
