use std::collections::HashMap;

use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::{Choice, Question, QuestionId, Quiz, QuizQuestion};
use storage::repository::QuestionRepository;

use crate::error::LoadError;

/// Storage-backed loader for a quiz's question set.
pub struct QuestionBank;

impl QuestionBank {
    /// Load questions and their choices in presentation order.
    ///
    /// When the quiz shuffles, question order and each question's choice
    /// order are randomized independently, exactly once per load; the
    /// result is never reshuffled mid-attempt.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` on repository failures or malformed bundles.
    pub async fn load(
        quiz: &Quiz,
        questions: &dyn QuestionRepository,
    ) -> Result<Vec<QuizQuestion>, LoadError> {
        Self::load_with_order(quiz, questions, quiz.settings().shuffle()).await
    }

    /// Load in stored order regardless of the shuffle flag.
    ///
    /// Reviews reopen attempts against the authored order, not a fresh
    /// shuffle.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` on repository failures or malformed bundles.
    pub async fn load_stored_order(
        quiz: &Quiz,
        questions: &dyn QuestionRepository,
    ) -> Result<Vec<QuizQuestion>, LoadError> {
        Self::load_with_order(quiz, questions, false).await
    }

    /// Degrade a failed fetch to "no questions": the attempt UI shows an
    /// empty state instead of crashing, and the error rides along for a
    /// dismissible message.
    pub async fn load_or_empty(
        quiz: &Quiz,
        questions: &dyn QuestionRepository,
    ) -> (Vec<QuizQuestion>, Option<LoadError>) {
        match Self::load(quiz, questions).await {
            Ok(bundles) => (bundles, None),
            Err(err) => {
                tracing::warn!(quiz_id = %quiz.id(), error = %err, "question load failed");
                (Vec::new(), Some(err))
            }
        }
    }

    async fn load_with_order(
        quiz: &Quiz,
        questions: &dyn QuestionRepository,
        shuffle: bool,
    ) -> Result<Vec<QuizQuestion>, LoadError> {
        let question_rows = questions.list_questions(quiz.id()).await?;
        let ids: Vec<QuestionId> = question_rows.iter().map(Question::id).collect();
        let choice_rows = questions.list_choices(&ids).await?;

        // rows arrive ordered by order_index; pushing preserves it
        let mut by_question: HashMap<QuestionId, Vec<Choice>> = HashMap::new();
        for choice in choice_rows {
            by_question.entry(choice.question_id()).or_default().push(choice);
        }

        let mut bundles = Vec::with_capacity(question_rows.len());
        for question in question_rows {
            let mut choices = by_question.remove(&question.id()).unwrap_or_default();
            if shuffle {
                let mut rng = rng();
                choices.as_mut_slice().shuffle(&mut rng);
            }
            bundles.push(QuizQuestion::new(question, choices)?);
        }

        if shuffle {
            let mut rng = rng();
            bundles.as_mut_slice().shuffle(&mut rng);
        }

        Ok(bundles)
    }
}
