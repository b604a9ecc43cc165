use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, mpsc, watch};

use quiz_core::model::{ChoiceId, QuestionId, Quiz, QuizQuestion, Viewer};

use super::progress::AttemptProgress;
use super::session::{AttemptSession, AttemptState};
use super::timer::{AttemptTimer, ExpiryTrigger};
use super::workflow::{AttemptService, StartReceipt, SubmitReceipt};
use crate::error::AttemptError;

/// What a start call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(StartReceipt),
    /// Another start or submit already holds the session; the duplicate
    /// trigger (double-click, second tab event) is dropped.
    AlreadyInFlight,
}

/// Owns one attempt session end to end: the shared state machine, the
/// deadline timer, and the wiring from timer expiry to auto-submit.
///
/// One runtime per browser-session equivalent. Locks are held only for
/// the duration of a single operation, so `answer` stays responsive
/// while background loads are pending; the start/submit windows
/// themselves are serialized by the same lock, which is exactly the
/// re-entry guard they need.
#[derive(Clone)]
pub struct AttemptRuntime {
    service: AttemptService,
    session: Arc<Mutex<AttemptSession>>,
    timer: Arc<StdMutex<Option<AttemptTimer>>>,
}

impl std::fmt::Debug for AttemptRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptRuntime").finish_non_exhaustive()
    }
}

impl AttemptRuntime {
    /// Wrap a loaded session for an attempting viewer.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::ReadOnlyViewer` for viewers that may not
    /// attempt (teachers preview via [`super::view::preview`] instead).
    pub fn for_viewer(
        service: AttemptService,
        quiz: Quiz,
        questions: Vec<QuizQuestion>,
        viewer: Viewer,
    ) -> Result<Self, AttemptError> {
        let student_id = viewer
            .student_id()
            .filter(|_| viewer.can_attempt())
            .ok_or(AttemptError::ReadOnlyViewer)?;
        Ok(Self {
            service,
            session: Arc::new(Mutex::new(AttemptSession::new(quiz, student_id, questions))),
            timer: Arc::new(StdMutex::new(None)),
        })
    }

    #[must_use]
    pub fn service(&self) -> &AttemptService {
        &self.service
    }

    /// Start a new attempt and arm the deadline timer for timed quizzes.
    ///
    /// A start (or submit) already in flight makes this a no-op
    /// (`StartOutcome::AlreadyInFlight`) rather than a second row.
    ///
    /// # Errors
    ///
    /// Propagates policy denials, state violations and storage failures
    /// from [`AttemptService::start`].
    pub async fn start(&self) -> Result<StartOutcome, AttemptError> {
        let Ok(mut guard) = self.session.try_lock() else {
            return Ok(StartOutcome::AlreadyInFlight);
        };
        let receipt = self.service.start(&mut guard).await?;
        drop(guard);

        if let Some(deadline) = receipt.deadline {
            let (timer, expiry) = AttemptTimer::arm(self.service.clock().clone(), deadline);
            if let Ok(mut slot) = self.timer.lock() {
                // replacing an old timer disarms it via Drop
                *slot = Some(timer);
            }
            self.spawn_expiry_listener(expiry);
        }

        Ok(StartOutcome::Started(receipt))
    }

    /// Record a selection on the running attempt.
    ///
    /// # Errors
    ///
    /// Propagates session guards (`NotInProgress`, `UnknownQuestion`,
    /// `UnknownChoice`).
    pub async fn answer(&self, question: QuestionId, choice: ChoiceId) -> Result<(), AttemptError> {
        self.session.lock().await.answer(question, choice)
    }

    /// Submit the attempt; `auto` marks a deadline-triggered submission.
    ///
    /// Returns `Ok(None)` for the losing trigger of a race — the attempt
    /// was already submitted (either way), or a deadline fired after a
    /// cancel. Exactly one caller ever receives a receipt.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` for a manual submit without
    /// a running attempt, and storage failures other than the tolerated
    /// finalize degrade.
    pub async fn submit(&self, auto: bool) -> Result<Option<SubmitReceipt>, AttemptError> {
        let mut guard = self.session.lock().await;
        match self.service.submit(&mut guard, auto).await {
            Ok(receipt) => {
                drop(guard);
                self.disarm_timer();
                Ok(Some(receipt))
            }
            Err(AttemptError::AlreadySubmitted) => Ok(None),
            Err(AttemptError::NotInProgress) if auto => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Abandon the running attempt (best-effort row delete).
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::NotInProgress` outside `InProgress`.
    pub async fn cancel(&self) -> Result<(), AttemptError> {
        let mut guard = self.session.lock().await;
        self.service.cancel(&mut guard).await?;
        drop(guard);
        self.disarm_timer();
        Ok(())
    }

    /// Clear a submitted cycle so a retake can start.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::AlreadyStarted` while an attempt runs.
    pub async fn reset(&self) -> Result<(), AttemptError> {
        self.session.lock().await.reset()
    }

    #[must_use]
    pub async fn state(&self) -> AttemptState {
        self.session.lock().await.state()
    }

    #[must_use]
    pub async fn progress(&self) -> AttemptProgress {
        self.session.lock().await.progress()
    }

    /// Seconds left, derived fresh from the stored deadline.
    #[must_use]
    pub async fn remaining_seconds(&self) -> Option<u64> {
        let now = self.service.clock().now();
        self.session.lock().await.remaining_seconds(now)
    }

    /// The live countdown channel, while a timer is armed.
    #[must_use]
    pub fn countdown(&self) -> Option<watch::Receiver<u64>> {
        self.timer
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(AttemptTimer::countdown))
    }

    /// Visibility-change hook: republish the countdown from the absolute
    /// deadline. Never submits.
    pub fn resync_countdown(&self) {
        let now = self.service.clock().now();
        if let Ok(slot) = self.timer.lock()
            && let Some(timer) = slot.as_ref()
        {
            timer.resync(now);
        }
    }

    fn disarm_timer(&self) {
        if let Ok(mut slot) = self.timer.lock()
            && let Some(timer) = slot.take()
        {
            timer.disarm();
        }
    }

    fn spawn_expiry_listener(&self, mut expiry: mpsc::UnboundedReceiver<ExpiryTrigger>) {
        let runtime = self.clone();
        tokio::spawn(async move {
            while let Some(trigger) = expiry.recv().await {
                match runtime.submit(true).await {
                    Ok(Some(receipt)) => {
                        tracing::debug!(
                            ?trigger,
                            score = receipt.score,
                            "deadline auto-submitted attempt"
                        );
                        break;
                    }
                    // the other trigger (or a manual click) won the race
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(?trigger, error = %err, "deadline auto-submit failed");
                        break;
                    }
                }
            }
        });
    }
}
