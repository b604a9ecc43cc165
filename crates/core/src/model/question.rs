use std::ops::Range;

use thiserror::Error;
use url::Url;

use crate::model::ids::{ChoiceId, QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("choice text cannot be empty")]
    EmptyChoiceText,

    #[error("underline annotation cannot be empty")]
    EmptyUnderline,

    #[error("choice {choice} does not belong to question {question}")]
    ForeignChoice {
        question: QuestionId,
        choice: ChoiceId,
    },
}

//
// ─── UNDERLINE ANNOTATION ──────────────────────────────────────────────────────
//

/// Display emphasis for a substring of the question text.
///
/// Matching is byte-wise; the case-insensitive mode ignores ASCII case
/// only, which covers the annotation data this engine receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Underline {
    substring: String,
    case_sensitive: bool,
}

impl Underline {
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyUnderline` if the substring is blank.
    pub fn new(substring: impl Into<String>, case_sensitive: bool) -> Result<Self, QuestionError> {
        let substring = substring.into();
        if substring.is_empty() {
            return Err(QuestionError::EmptyUnderline);
        }
        Ok(Self {
            substring,
            case_sensitive,
        })
    }

    #[must_use]
    pub fn substring(&self) -> &str {
        &self.substring
    }

    #[must_use]
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Locates the first occurrence of the annotated substring in `text`,
    /// returning its byte range for the renderer.
    #[must_use]
    pub fn find_in(&self, text: &str) -> Option<Range<usize>> {
        let needle = self.substring.as_bytes();
        if self.case_sensitive {
            return text
                .find(&self.substring)
                .map(|start| start..start + needle.len());
        }
        if needle.len() > text.len() {
            return None;
        }
        text.as_bytes()
            .windows(needle.len())
            .position(|window| window.eq_ignore_ascii_case(needle))
            .map(|start| start..start + needle.len())
    }
}

//
// ─── QUESTION & CHOICES ────────────────────────────────────────────────────────
//

pub const DEFAULT_POINTS: u32 = 1;

/// A single question of a quiz, immutable to the attempt engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    quiz_id: QuizId,
    order_index: u32,
    text: String,
    instructions: Option<String>,
    instruction_image: Option<Url>,
    points: u32,
    underline: Option<Underline>,
}

impl Question {
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyText` if the question text is blank.
    pub fn new(
        id: QuestionId,
        quiz_id: QuizId,
        order_index: u32,
        text: impl Into<String>,
        points: u32,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        Ok(Self {
            id,
            quiz_id,
            order_index,
            text,
            instructions: None,
            instruction_image: None,
            points,
            underline: None,
        })
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions;
        self
    }

    #[must_use]
    pub fn with_instruction_image(mut self, image: Option<Url>) -> Self {
        self.instruction_image = image;
        self
    }

    #[must_use]
    pub fn with_underline(mut self, underline: Option<Underline>) -> Self {
        self.underline = underline;
        self
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    #[must_use]
    pub fn instruction_image(&self) -> Option<&Url> {
        self.instruction_image.as_ref()
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn underline(&self) -> Option<&Underline> {
        self.underline.as_ref()
    }
}

/// One selectable answer for a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    id: ChoiceId,
    question_id: QuestionId,
    order_index: u32,
    text: String,
    is_correct: bool,
}

impl Choice {
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyChoiceText` if the choice text is blank.
    pub fn new(
        id: ChoiceId,
        question_id: QuestionId,
        order_index: u32,
        text: impl Into<String>,
        is_correct: bool,
    ) -> Result<Self, QuestionError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyChoiceText);
        }
        Ok(Self {
            id,
            question_id,
            order_index,
            text,
            is_correct,
        })
    }

    #[must_use]
    pub fn id(&self) -> ChoiceId {
        self.id
    }

    #[must_use]
    pub fn question_id(&self) -> QuestionId {
        self.question_id
    }

    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }
}

/// A question bundled with its choices in presentation order.
///
/// The choice order is whatever the loader decided (stored order, or the
/// one-time shuffle); this type preserves it as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    question: Question,
    choices: Vec<Choice>,
}

impl QuizQuestion {
    /// Bundles a question with its choices, keeping the given order.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::ForeignChoice` if any choice belongs to a
    /// different question.
    pub fn new(question: Question, choices: Vec<Choice>) -> Result<Self, QuestionError> {
        if let Some(stray) = choices.iter().find(|c| c.question_id() != question.id()) {
            return Err(QuestionError::ForeignChoice {
                question: question.id(),
                choice: stray.id(),
            });
        }
        Ok(Self { question, choices })
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }

    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.question.id()
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.question.points()
    }

    /// A question is multi-answer iff more than one choice is correct.
    #[must_use]
    pub fn is_multi_answer(&self) -> bool {
        self.choices.iter().filter(|c| c.is_correct()).count() > 1
    }

    /// IDs of the correct choices, sorted for set comparison.
    #[must_use]
    pub fn correct_choice_ids(&self) -> Vec<ChoiceId> {
        let mut ids: Vec<ChoiceId> = self
            .choices
            .iter()
            .filter(|c| c.is_correct())
            .map(Choice::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn has_choice(&self, id: ChoiceId) -> bool {
        self.choices.iter().any(|c| c.id() == id)
    }
}
