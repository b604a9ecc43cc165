//! Read-only reconstruction of a past attempt's correctness from its
//! persisted answers.
//!
//! Verdicts are derived with the scoring engine's own comparison, so a
//! review can never disagree with the score that was written.

use crate::model::{AnswerMap, ChoiceId, QuestionId, QuizQuestion};
use crate::scoring;

/// Correctness label for one reviewed question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerVerdict {
    Correct,
    Incorrect,
}

/// One question of a reconstructed review.
///
/// `selected` is empty for an unanswered question (verdict `Incorrect`,
/// zero points — the same classification the scoring engine applied).
/// `correct_choices` is populated only when the quiz reveals answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub question_id: QuestionId,
    pub selected: Vec<ChoiceId>,
    pub verdict: AnswerVerdict,
    pub points_awarded: u32,
    pub correct_choices: Option<Vec<ChoiceId>>,
}

impl QuestionReview {
    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.verdict == AnswerVerdict::Correct
    }
}

/// Rebuild per-question correctness for a persisted answer map, in the
/// given question order.
#[must_use]
pub fn reconstruct(
    questions: &[QuizQuestion],
    answers: &AnswerMap,
    reveal_correct: bool,
) -> Vec<QuestionReview> {
    questions
        .iter()
        .map(|question| {
            let selected = answers
                .get(&question.id())
                .cloned()
                .unwrap_or_default();
            let matched = scoring::selection_matches(&question.correct_choice_ids(), &selected);
            QuestionReview {
                question_id: question.id(),
                selected,
                verdict: if matched {
                    AnswerVerdict::Correct
                } else {
                    AnswerVerdict::Incorrect
                },
                points_awarded: if matched { question.points() } else { 0 },
                correct_choices: reveal_correct.then(|| question.correct_choice_ids()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Choice, Question, QuizId};

    fn build_question(id: u64, correct: &[u64], wrong: &[u64]) -> QuizQuestion {
        let question = Question::new(
            QuestionId::new(id),
            QuizId::new(1),
            u32::try_from(id).unwrap(),
            format!("question {id}"),
            1,
        )
        .unwrap();
        let mut choices = Vec::new();
        for (order, choice_id) in correct.iter().chain(wrong).enumerate() {
            choices.push(
                Choice::new(
                    ChoiceId::new(*choice_id),
                    QuestionId::new(id),
                    u32::try_from(order).unwrap(),
                    format!("choice {choice_id}"),
                    correct.contains(choice_id),
                )
                .unwrap(),
            );
        }
        QuizQuestion::new(question, choices).unwrap()
    }

    #[test]
    fn verdicts_agree_with_scoring_for_any_answer_map() {
        let questions = vec![
            build_question(1, &[10], &[11, 12]),
            build_question(2, &[20, 21], &[22]),
            build_question(3, &[30], &[31]),
        ];

        // partially right, partially wrong, partially unanswered
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId::new(1), vec![ChoiceId::new(10)]);
        answers.insert(QuestionId::new(2), vec![ChoiceId::new(20)]);

        let reviews = reconstruct(&questions, &answers, false);
        assert_eq!(reviews.len(), questions.len());

        for (question, review) in questions.iter().zip(&reviews) {
            let scored = scoring::score_question(question, &review.selected);
            assert_eq!(review.points_awarded, scored);
            assert_eq!(review.is_correct(), scored == question.points());
        }
    }

    #[test]
    fn correct_choices_hidden_unless_revealed() {
        let questions = vec![build_question(1, &[10], &[11])];
        let answers = AnswerMap::new();

        let hidden = reconstruct(&questions, &answers, false);
        assert_eq!(hidden[0].correct_choices, None);

        let shown = reconstruct(&questions, &answers, true);
        assert_eq!(shown[0].correct_choices, Some(vec![ChoiceId::new(10)]));
    }

    #[test]
    fn unanswered_question_is_incorrect_with_empty_selection() {
        let questions = vec![build_question(1, &[10], &[11])];
        let reviews = reconstruct(&questions, &AnswerMap::new(), false);

        assert_eq!(reviews[0].verdict, AnswerVerdict::Incorrect);
        assert!(reviews[0].selected.is_empty());
        assert_eq!(reviews[0].points_awarded, 0);
    }

    #[test]
    fn reviews_follow_question_order() {
        let questions = vec![build_question(2, &[20], &[21]), build_question(1, &[10], &[11])];
        let reviews = reconstruct(&questions, &AnswerMap::new(), false);
        assert_eq!(reviews[0].question_id, QuestionId::new(2));
        assert_eq!(reviews[1].question_id, QuestionId::new(1));
    }
}
