use std::sync::Arc;

use quiz_core::model::{Attempt, AttemptId, ChoiceId, QuizId, QuizQuestion, StudentId};
use quiz_core::review::{self, QuestionReview};

use super::history::AttemptHistory;
use super::loader::QuestionBank;
use crate::error::LoadError;
use storage::repository::{AttemptRepository, QuestionRepository, QuizRepository};

/// A persisted attempt reconstructed for read-only display.
#[derive(Debug, Clone)]
pub struct AttemptReview {
    pub attempt: Attempt,
    pub reviews: Vec<QuestionReview>,
}

impl AttemptReview {
    #[must_use]
    pub fn score(&self) -> u32 {
        self.attempt.score()
    }

    #[must_use]
    pub fn auto_submitted(&self) -> bool {
        self.attempt.meta().is_some_and(|meta| meta.auto_submitted)
    }
}

/// One question of the teacher's read-only preview: all correct answers
/// shown, no attempt and no scoring involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewQuestion {
    pub question_id: quiz_core::model::QuestionId,
    pub correct_choices: Vec<ChoiceId>,
}

/// Build the teacher-role preview for a loaded question set.
#[must_use]
pub fn preview(questions: &[QuizQuestion]) -> Vec<PreviewQuestion> {
    questions
        .iter()
        .map(|question| PreviewQuestion {
            question_id: question.id(),
            correct_choices: question.correct_choice_ids(),
        })
        .collect()
}

/// Clock-face rendering of the visible countdown (`m:ss`, hours when
/// needed).
#[must_use]
pub fn format_countdown(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Reopens persisted attempts as read-only reviews.
///
/// Uses the stored question order (never a fresh shuffle) and derives
/// correctness with the scoring engine's own comparison, so the review
/// always matches the score that was written.
#[derive(Clone)]
pub struct AttemptReviewService {
    quizzes: Arc<dyn QuizRepository>,
    questions: Arc<dyn QuestionRepository>,
    attempts: Arc<dyn AttemptRepository>,
}

impl AttemptReviewService {
    #[must_use]
    pub fn new(
        quizzes: Arc<dyn QuizRepository>,
        questions: Arc<dyn QuestionRepository>,
        attempts: Arc<dyn AttemptRepository>,
    ) -> Self {
        Self {
            quizzes,
            questions,
            attempts,
        }
    }

    /// Rebuild the review for one persisted attempt.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::AttemptNotFound` for a missing attempt,
    /// `LoadError::AttemptNotSubmitted` for one still in progress, and
    /// storage failures otherwise.
    pub async fn review_attempt(&self, attempt_id: AttemptId) -> Result<AttemptReview, LoadError> {
        let attempt = self
            .attempts
            .get_attempt(attempt_id)
            .await?
            .ok_or(LoadError::AttemptNotFound(attempt_id))?;
        self.review_of(attempt).await
    }

    /// Review of the student's most recent submitted attempt, if any.
    ///
    /// This seeds the review screen on reopen, independent of whether a
    /// new attempt is ever started.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` on storage failures.
    pub async fn review_last_submitted(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<Option<AttemptReview>, LoadError> {
        let attempts = self.attempts.list_attempts(quiz_id, student_id).await?;
        let history = AttemptHistory::from_attempts(attempts);
        match history.last_submitted() {
            Some(attempt) => Ok(Some(self.review_of(attempt.clone()).await?)),
            None => Ok(None),
        }
    }

    async fn review_of(&self, attempt: Attempt) -> Result<AttemptReview, LoadError> {
        let Some(meta) = attempt.meta() else {
            return Err(LoadError::AttemptNotSubmitted(attempt.id()));
        };

        let quiz = self
            .quizzes
            .get_quiz(attempt.quiz_id())
            .await?
            .ok_or(LoadError::QuizNotFound(attempt.quiz_id()))?;
        let questions = QuestionBank::load_stored_order(&quiz, self.questions.as_ref()).await?;

        let reviews = review::reconstruct(
            &questions,
            &meta.answers,
            quiz.settings().reveal_correct_answers(),
        );
        Ok(AttemptReview { attempt, reviews })
    }
}
