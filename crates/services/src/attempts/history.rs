use chrono::{DateTime, Utc};

use quiz_core::model::{Attempt, Quiz};

use crate::error::StartDenied;

/// Attempt counter and history for one (quiz, student) pair.
///
/// Started-but-never-submitted attempts count toward the cap; only the
/// most recent *submitted* attempt seeds score display and review.
#[derive(Debug, Clone, Default)]
pub struct AttemptHistory {
    attempts: Vec<Attempt>,
}

impl AttemptHistory {
    /// Build from a repository listing. Order is normalized to newest
    /// attempt number first regardless of what the store returned.
    #[must_use]
    pub fn from_attempts(mut attempts: Vec<Attempt>) -> Self {
        attempts.sort_by(|a, b| b.attempt_number().cmp(&a.attempt_number()));
        Self { attempts }
    }

    #[must_use]
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Attempts held so far, started or submitted.
    #[must_use]
    pub fn attempts_used(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }

    /// The most recent submitted attempt, if any.
    #[must_use]
    pub fn last_submitted(&self) -> Option<&Attempt> {
        self.attempts.iter().find(|a| a.is_submitted())
    }

    /// Score of the most recent submitted attempt.
    #[must_use]
    pub fn last_score(&self) -> Option<u32> {
        self.last_submitted().map(Attempt::score)
    }

    /// The attempt number a new start would take: one past the highest
    /// ever assigned, 1 for a clean slate.
    #[must_use]
    pub fn next_attempt_number(&self) -> u32 {
        self.attempts
            .first()
            .map_or(1, |a| a.attempt_number().saturating_add(1))
    }

    /// Why a new attempt cannot start now, or `None` when it can.
    #[must_use]
    pub fn start_denial(&self, quiz: &Quiz, now: DateTime<Utc>) -> Option<StartDenied> {
        let settings = quiz.settings();
        if !settings.is_published() {
            return Some(StartDenied::NotPublished);
        }
        if settings.available_from().is_some_and(|from| now < from) {
            return Some(StartDenied::NotYetAvailable);
        }
        if settings.expires_at().is_some_and(|until| now > until) {
            return Some(StartDenied::Expired);
        }
        if self.attempts_used() >= settings.max_attempts() {
            return Some(StartDenied::NoAttemptsLeft);
        }
        None
    }

    #[must_use]
    pub fn can_start(&self, quiz: &Quiz, now: DateTime<Utc>) -> bool {
        self.start_denial(quiz, now).is_none()
    }
}
