use std::collections::BTreeMap;

use crate::model::ids::{ChoiceId, QuestionId};

/// Persisted shape of a student's selections: question → chosen choice IDs
/// in selection order.
pub type AnswerMap = BTreeMap<QuestionId, Vec<ChoiceId>>;

/// In-memory selection state for an attempt in progress.
///
/// Nothing here touches the network; the sheet is snapshotted into the
/// attempt meta record once, at submit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSheet {
    selected: AnswerMap,
}

impl AnswerSheet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection for a single-answer question (radio
    /// semantics): afterwards exactly `[choice]` is selected.
    pub fn select_single(&mut self, question: QuestionId, choice: ChoiceId) {
        self.selected.insert(question, vec![choice]);
    }

    /// Flip membership of `choice` for a multi-answer question (checkbox
    /// semantics). Toggling the last selected choice off removes the
    /// question from the sheet entirely.
    pub fn toggle(&mut self, question: QuestionId, choice: ChoiceId) {
        let entry = self.selected.entry(question).or_default();
        if let Some(pos) = entry.iter().position(|c| *c == choice) {
            entry.remove(pos);
        } else {
            entry.push(choice);
        }
        if entry.is_empty() {
            self.selected.remove(&question);
        }
    }

    /// Currently selected choices for a question, in selection order.
    #[must_use]
    pub fn selected(&self, question: QuestionId) -> &[ChoiceId] {
        self.selected.get(&question).map_or(&[][..], Vec::as_slice)
    }

    /// Number of questions with at least one selection.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// Snapshot the sheet into the persisted answer shape.
    #[must_use]
    pub fn to_answer_map(&self) -> AnswerMap {
        self.selected.clone()
    }
}
