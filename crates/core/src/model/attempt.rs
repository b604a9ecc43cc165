use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::answers::AnswerMap;
use crate::model::ids::{AttemptId, QuizId, StudentId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("submitted_at is before started_at")]
    InvalidTimeRange,

    #[error("attempt numbers are 1-based")]
    ZeroAttemptNumber,

    #[error("a submitted attempt requires a meta record")]
    MissingMeta,
}

//
// ─── META RECORD ───────────────────────────────────────────────────────────────
//

/// Structured record finalized with an attempt: the answer snapshot and
/// whether the deadline (rather than the student) triggered submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptMeta {
    #[serde(with = "answer_entries")]
    pub answers: AnswerMap,
    pub auto_submitted: bool,
}

/// Encodes the answer map as a list of entries so the question IDs stay
/// numeric on the wire instead of becoming JSON object keys.
mod answer_entries {
    use serde::de::Deserializer;
    use serde::ser::Serializer;
    use serde::{Deserialize, Serialize};

    use crate::model::answers::AnswerMap;
    use crate::model::ids::{ChoiceId, QuestionId};

    #[derive(Serialize, Deserialize)]
    struct Entry {
        question: QuestionId,
        choices: Vec<ChoiceId>,
    }

    pub fn serialize<S: Serializer>(answers: &AnswerMap, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<Entry> = answers
            .iter()
            .map(|(question, choices)| Entry {
                question: *question,
                choices: choices.clone(),
            })
            .collect();
        entries.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AnswerMap, D::Error> {
        let entries = Vec::<Entry>::deserialize(deserializer)?;
        Ok(entries
            .into_iter()
            .map(|entry| (entry.question, entry.choices))
            .collect())
    }
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// One timed run of a quiz by one student.
///
/// Created at start with an empty shell, mutated only in memory, and
/// finalized by the persister exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    id: AttemptId,
    quiz_id: QuizId,
    student_id: StudentId,
    attempt_number: u32,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    duration_seconds: u32,
    score: u32,
    meta: Option<AttemptMeta>,
}

impl Attempt {
    /// The shell row created when an attempt starts: no submission, no
    /// score, no meta.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ZeroAttemptNumber` if `attempt_number` is 0.
    pub fn started(
        id: AttemptId,
        quiz_id: QuizId,
        student_id: StudentId,
        attempt_number: u32,
        started_at: DateTime<Utc>,
    ) -> Result<Self, AttemptError> {
        if attempt_number == 0 {
            return Err(AttemptError::ZeroAttemptNumber);
        }
        Ok(Self {
            id,
            quiz_id,
            student_id,
            attempt_number,
            started_at,
            submitted_at: None,
            duration_seconds: 0,
            score: 0,
            meta: None,
        })
    }

    /// Rehydrate an attempt from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTimeRange` if the submission predates
    /// the start, `AttemptError::ZeroAttemptNumber` for a 0 attempt
    /// number, and `AttemptError::MissingMeta` for a submitted attempt
    /// without its meta record.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: AttemptId,
        quiz_id: QuizId,
        student_id: StudentId,
        attempt_number: u32,
        started_at: DateTime<Utc>,
        submitted_at: Option<DateTime<Utc>>,
        duration_seconds: u32,
        score: u32,
        meta: Option<AttemptMeta>,
    ) -> Result<Self, AttemptError> {
        if attempt_number == 0 {
            return Err(AttemptError::ZeroAttemptNumber);
        }
        if let Some(submitted) = submitted_at {
            if submitted < started_at {
                return Err(AttemptError::InvalidTimeRange);
            }
            if meta.is_none() {
                return Err(AttemptError::MissingMeta);
            }
        }
        Ok(Self {
            id,
            quiz_id,
            student_id,
            attempt_number,
            started_at,
            submitted_at,
            duration_seconds,
            score,
            meta,
        })
    }

    #[must_use]
    pub fn id(&self) -> AttemptId {
        self.id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn attempt_number(&self) -> u32 {
        self.attempt_number
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Seconds between start and submission, floored at 1 by the
    /// submit path. Zero while the attempt is in progress.
    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_seconds
    }

    /// Meaningful only once `submitted_at` is set.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn meta(&self) -> Option<&AttemptMeta> {
        self.meta.as_ref()
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{ChoiceId, QuestionId};
    use crate::time::fixed_now;
    use chrono::Duration;
    use uuid::Uuid;

    fn student() -> StudentId {
        StudentId::new(Uuid::from_u128(7))
    }

    fn meta() -> AttemptMeta {
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId::new(1), vec![ChoiceId::new(10)]);
        AttemptMeta {
            answers,
            auto_submitted: false,
        }
    }

    #[test]
    fn started_shell_has_no_submission() {
        let attempt = Attempt::started(
            AttemptId::new(1),
            QuizId::new(1),
            student(),
            1,
            fixed_now(),
        )
        .unwrap();

        assert!(!attempt.is_submitted());
        assert_eq!(attempt.score(), 0);
        assert_eq!(attempt.meta(), None);
    }

    #[test]
    fn rejects_zero_attempt_number() {
        let err =
            Attempt::started(AttemptId::new(1), QuizId::new(1), student(), 0, fixed_now())
                .unwrap_err();
        assert_eq!(err, AttemptError::ZeroAttemptNumber);
    }

    #[test]
    fn rejects_submission_before_start() {
        let now = fixed_now();
        let err = Attempt::from_persisted(
            AttemptId::new(1),
            QuizId::new(1),
            student(),
            1,
            now,
            Some(now - Duration::seconds(5)),
            60,
            1,
            Some(meta()),
        )
        .unwrap_err();
        assert_eq!(err, AttemptError::InvalidTimeRange);
    }

    #[test]
    fn rejects_submitted_attempt_without_meta() {
        let now = fixed_now();
        let err = Attempt::from_persisted(
            AttemptId::new(1),
            QuizId::new(1),
            student(),
            1,
            now,
            Some(now),
            60,
            1,
            None,
        )
        .unwrap_err();
        assert_eq!(err, AttemptError::MissingMeta);
    }

    #[test]
    fn meta_roundtrips_through_json() {
        let original = AttemptMeta {
            answers: meta().answers,
            auto_submitted: true,
        };

        let json = serde_json::to_string(&original).unwrap();
        assert!(json.contains("autoSubmitted"));

        let back: AttemptMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
