use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::ids::QuizId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("max attempts must be > 0")]
    ZeroMaxAttempts,

    #[error("availability window expires before it opens")]
    InvalidAvailabilityWindow,
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Attempt policy for a quiz.
///
/// Controls the time limit, the availability window, how many attempts a
/// student may use, and whether the review reveals correct answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSettings {
    time_limit_minutes: Option<u32>,
    available_from: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    max_attempts: u32,
    reveal_correct_answers: bool,
    is_published: bool,
    shuffle: bool,
}

impl QuizSettings {
    /// Creates settings with the given attempt cap and everything else at
    /// rest: no time limit, an always-open window, answers hidden in
    /// review, unpublished, no shuffle.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::ZeroMaxAttempts` if `max_attempts` is zero.
    pub fn new(max_attempts: u32) -> Result<Self, QuizError> {
        if max_attempts == 0 {
            return Err(QuizError::ZeroMaxAttempts);
        }
        Ok(Self {
            time_limit_minutes: None,
            available_from: None,
            expires_at: None,
            max_attempts,
            reveal_correct_answers: false,
            is_published: false,
            shuffle: false,
        })
    }

    /// Sets a wall-clock time limit in minutes. `None` means unlimited.
    #[must_use]
    pub fn with_time_limit_minutes(mut self, minutes: Option<u32>) -> Self {
        self.time_limit_minutes = minutes;
        self
    }

    /// Sets the availability window. A `None` bound is open-ended.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::InvalidAvailabilityWindow` if both bounds are
    /// present and the window expires before it opens.
    pub fn with_window(
        mut self,
        available_from: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, QuizError> {
        if let (Some(from), Some(until)) = (available_from, expires_at)
            && until < from
        {
            return Err(QuizError::InvalidAvailabilityWindow);
        }
        self.available_from = available_from;
        self.expires_at = expires_at;
        Ok(self)
    }

    /// Sets whether the post-submit review annotates correct choices.
    #[must_use]
    pub fn with_reveal_correct_answers(mut self, reveal: bool) -> Self {
        self.reveal_correct_answers = reveal;
        self
    }

    #[must_use]
    pub fn published(mut self, is_published: bool) -> Self {
        self.is_published = is_published;
        self
    }

    /// Sets whether question and choice order are shuffled once per load.
    #[must_use]
    pub fn shuffled(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> Option<u32> {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn available_from(&self) -> Option<DateTime<Utc>> {
        self.available_from
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn reveal_correct_answers(&self) -> bool {
        self.reveal_correct_answers
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.is_published
    }

    #[must_use]
    pub fn shuffle(&self) -> bool {
        self.shuffle
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

/// A published assessment as the attempt engine sees it.
///
/// Quizzes are authored elsewhere and immutable here; the engine only
/// reads the attempt policy and identity fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    id: QuizId,
    title: String,
    description: Option<String>,
    settings: QuizSettings,
}

impl Quiz {
    /// Creates a quiz with a validated title and settings.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptyTitle` if the title is blank.
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        description: Option<String>,
        settings: QuizSettings,
    ) -> Result<Self, QuizError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            description,
            settings,
        })
    }

    /// Rehydrate a quiz from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if any persisted field fails validation.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: QuizId,
        title: String,
        description: Option<String>,
        time_limit_minutes: Option<u32>,
        available_from: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
        max_attempts: u32,
        reveal_correct_answers: bool,
        is_published: bool,
        shuffle: bool,
    ) -> Result<Self, QuizError> {
        let settings = QuizSettings::new(max_attempts)?
            .with_time_limit_minutes(time_limit_minutes)
            .with_window(available_from, expires_at)?
            .with_reveal_correct_answers(reveal_correct_answers)
            .published(is_published)
            .shuffled(shuffle);
        Self::new(id, title, description, settings)
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn settings(&self) -> &QuizSettings {
        &self.settings
    }

    /// The wall-clock limit for one attempt, if any.
    #[must_use]
    pub fn time_limit(&self) -> Option<Duration> {
        self.settings
            .time_limit_minutes
            .map(|minutes| Duration::seconds(i64::from(minutes) * 60))
    }

    /// True when `now` falls inside the availability window.
    ///
    /// Open-ended bounds always pass; publication is checked separately.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let after_open = self.settings.available_from.is_none_or(|from| now >= from);
        let before_close = self.settings.expires_at.is_none_or(|until| now <= until);
        after_open && before_close
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn settings() -> QuizSettings {
        QuizSettings::new(3).unwrap().published(true)
    }

    #[test]
    fn rejects_empty_title() {
        let err = Quiz::new(QuizId::new(1), "   ", None, settings()).unwrap_err();
        assert_eq!(err, QuizError::EmptyTitle);
    }

    #[test]
    fn rejects_zero_max_attempts() {
        assert_eq!(QuizSettings::new(0).unwrap_err(), QuizError::ZeroMaxAttempts);
    }

    #[test]
    fn rejects_inverted_window() {
        let now = fixed_now();
        let err = settings()
            .with_window(Some(now), Some(now - Duration::hours(1)))
            .unwrap_err();
        assert_eq!(err, QuizError::InvalidAvailabilityWindow);
    }

    #[test]
    fn open_window_bounds_are_inclusive() {
        let now = fixed_now();
        let settings = settings()
            .with_window(Some(now), Some(now + Duration::hours(1)))
            .unwrap();
        let quiz = Quiz::new(QuizId::new(1), "Algebra check-in", None, settings).unwrap();

        assert!(quiz.is_open_at(now));
        assert!(quiz.is_open_at(now + Duration::hours(1)));
        assert!(!quiz.is_open_at(now - Duration::seconds(1)));
        assert!(!quiz.is_open_at(now + Duration::hours(2)));
    }

    #[test]
    fn missing_bounds_are_open_ended() {
        let quiz = Quiz::new(QuizId::new(1), "Untimed", None, settings()).unwrap();
        assert!(quiz.is_open_at(fixed_now()));
        assert_eq!(quiz.time_limit(), None);
    }

    #[test]
    fn time_limit_converts_minutes_to_duration() {
        let settings = settings().with_time_limit_minutes(Some(10));
        let quiz = Quiz::new(QuizId::new(1), "Timed", None, settings).unwrap();
        assert_eq!(quiz.time_limit(), Some(Duration::seconds(600)));
    }
}
