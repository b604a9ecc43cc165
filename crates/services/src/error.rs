//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AttemptId, ChoiceId, QuestionId, QuizId};
use storage::repository::StorageError;

/// Why a new attempt cannot start right now.
///
/// These are policy denials, not failures; the UI shows them as-is
/// ("No attempts left") and leaves the session in `NotStarted`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StartDenied {
    #[error("quiz is not published")]
    NotPublished,
    #[error("quiz is not yet available")]
    NotYetAvailable,
    #[error("quiz availability has expired")]
    Expired,
    #[error("no attempts left")]
    NoAttemptsLeft,
}

/// Errors emitted while loading the question bank or a persisted review.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("quiz {0} not found")]
    QuizNotFound(QuizId),
    #[error("attempt {0} not found")]
    AttemptNotFound(AttemptId),
    #[error("attempt {0} has not been submitted")]
    AttemptNotSubmitted(AttemptId),
    #[error(transparent)]
    Question(#[from] quiz_core::model::QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the attempt session and its orchestration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("a start is already in flight")]
    StartInFlight,
    #[error("an attempt is already in progress")]
    AlreadyStarted,
    #[error("attempt is not in progress")]
    NotInProgress,
    #[error("attempt was already submitted")]
    AlreadySubmitted,
    #[error("this viewer cannot take the quiz")]
    ReadOnlyViewer,
    #[error(transparent)]
    Denied(StartDenied),
    #[error("question {0} is not part of this attempt")]
    UnknownQuestion(QuestionId),
    #[error("choice {choice} does not belong to question {question}")]
    UnknownChoice {
        question: QuestionId,
        choice: ChoiceId,
    },
    #[error(transparent)]
    Attempt(#[from] quiz_core::model::AttemptError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
