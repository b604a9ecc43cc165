use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use quiz_core::Clock;

//
// ─── DEADLINE ──────────────────────────────────────────────────────────────────
//

/// The absolute instant a timed attempt ends.
///
/// Remaining time is always recomputed as `max(0, at − now)` rather than
/// decremented from a running counter, so a process that was suspended
/// past its deadline wakes up to `0`, never to a stale or negative value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: DateTime<Utc>,
}

impl Deadline {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, limit: ChronoDuration) -> Self {
        Self {
            at: started_at + limit,
        }
    }

    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    /// Time left, clamped at zero.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> ChronoDuration {
        (self.at - now).max(ChronoDuration::zero())
    }

    /// Whole seconds left, clamped at zero.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from(self.remaining(now).num_seconds()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.at
    }
}

//
// ─── TIMER ─────────────────────────────────────────────────────────────────────
//

/// Which of the two racing triggers noticed expiry first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryTrigger {
    DisplayTick,
    HardTimeout,
}

/// Countdown machinery for one timed attempt.
///
/// Two independently scheduled tasks race toward expiry: a 1-second
/// display tick that republishes the recomputed countdown, and a single
/// hard timeout sleeping until the deadline. Each sends at most one
/// expiry event; the consumer feeds them into `submit(auto)`, where the
/// session's single admission makes the second a no-op.
pub struct AttemptTimer {
    deadline: Deadline,
    countdown_tx: watch::Sender<u64>,
    countdown_rx: watch::Receiver<u64>,
    tick_task: JoinHandle<()>,
    timeout_task: JoinHandle<()>,
}

impl AttemptTimer {
    /// Spawn the tick and timeout tasks for a deadline.
    ///
    /// Returns the timer handle plus the expiry event stream. The caller
    /// owns draining the stream; dropping it only drops notifications,
    /// never the countdown.
    #[must_use]
    pub fn arm(
        clock: Clock,
        deadline: Deadline,
    ) -> (Self, mpsc::UnboundedReceiver<ExpiryTrigger>) {
        let (countdown_tx, countdown_rx) =
            watch::channel(deadline.remaining_seconds(clock.now()));
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();

        let tick_countdown = countdown_tx.clone();
        let tick_expiry = expiry_tx.clone();
        let tick_clock = clock.clone();
        let tick_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // after a long suspension we want one fresh recompute, not a
            // burst of catch-up ticks
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let remaining = deadline.remaining_seconds(tick_clock.now());
                let _ = tick_countdown.send(remaining);
                if remaining == 0 {
                    let _ = tick_expiry.send(ExpiryTrigger::DisplayTick);
                    break;
                }
            }
        });

        let timeout_task = tokio::spawn(async move {
            let wait = deadline
                .remaining(clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
            let _ = expiry_tx.send(ExpiryTrigger::HardTimeout);
        });

        (
            Self {
                deadline,
                countdown_tx,
                countdown_rx,
                tick_task,
                timeout_task,
            },
            expiry_rx,
        )
    }

    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Watch channel carrying the recomputed remaining seconds.
    #[must_use]
    pub fn countdown(&self) -> watch::Receiver<u64> {
        self.countdown_rx.clone()
    }

    /// Republish the countdown from the stored deadline.
    ///
    /// This is the visibility-change hook: it corrects the display after
    /// a suspension without ever touching submission.
    pub fn resync(&self, now: DateTime<Utc>) {
        let _ = self.countdown_tx.send(self.deadline.remaining_seconds(now));
    }

    /// Stop both trigger tasks.
    pub fn disarm(&self) {
        self.tick_task.abort();
        self.timeout_task.abort();
    }
}

impl Drop for AttemptTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
