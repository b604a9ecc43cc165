//! Exact-set scoring: a question's points are awarded iff the selected
//! choice set equals the correct choice set. No partial credit.

use crate::model::{AnswerMap, ChoiceId, QuizQuestion};

/// True when `selected` and `correct` are the same set of IDs, order
/// independent.
#[must_use]
pub fn selection_matches(correct: &[ChoiceId], selected: &[ChoiceId]) -> bool {
    let mut correct = correct.to_vec();
    correct.sort_unstable();
    correct.dedup();

    let mut selected = selected.to_vec();
    selected.sort_unstable();
    selected.dedup();

    correct == selected
}

/// Points for one question: all of them on an exact match, zero
/// otherwise. An empty selection is just another set to compare.
#[must_use]
pub fn score_question(question: &QuizQuestion, selected: &[ChoiceId]) -> u32 {
    if selection_matches(&question.correct_choice_ids(), selected) {
        question.points()
    } else {
        0
    }
}

/// Total score for an attempt: the sum over all questions, with
/// unanswered questions contributing zero.
#[must_use]
pub fn score_answers(questions: &[QuizQuestion], answers: &AnswerMap) -> u32 {
    questions
        .iter()
        .map(|question| {
            let selected = answers.get(&question.id()).map_or(&[][..], Vec::as_slice);
            score_question(question, selected)
        })
        .sum()
}
