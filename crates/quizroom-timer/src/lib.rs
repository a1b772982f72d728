//! Single-shot deadline timer for Quizroom room actors.
//!
//! A room has at most one pending deadline at a time: the close of the
//! current question's answer window. [`DeadlineTimer`] holds that deadline
//! together with a caller-chosen key (the room uses the question sequence
//! number) so that a firing can be matched against the state it was armed
//! for.
//!
//! # Disarmed mode
//!
//! While nothing is armed, [`DeadlineTimer::wait`] pends forever. Rooms that
//! are waiting for players or showing a scoreboard therefore cost nothing
//! between commands.
//!
//! # Integration
//!
//! The timer is meant to sit inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle command, re-arm */ }
//!         expiry = timer.wait() => {
//!             let events = room.on_deadline(expiry.key, now);
//!         }
//!     }
//! }
//! ```
//!
//! `wait` only mutates the timer after its sleep completes, so dropping the
//! future when another `select!` branch wins leaves the deadline armed.

use std::fmt::Debug;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`DeadlineTimer`].
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// A firing later than this past its deadline is logged at `warn` and
    /// counted in [`TimerMetrics::late`].
    pub late_warn_threshold: Duration,
    /// Collect [`TimerMetrics`].
    pub metrics_enabled: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            late_warn_threshold: Duration::from_millis(250),
            metrics_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Expiry (returned to caller on fire)
// ---------------------------------------------------------------------------

/// A deadline that passed, returned by [`DeadlineTimer::wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry<K> {
    /// The key the deadline was armed with.
    pub key: K,
    /// When the deadline was due.
    pub deadline: Instant,
    /// How long after `deadline` the timer actually woke up.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters for a single timer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerMetrics {
    /// Deadlines armed, including replacements.
    pub armed: u64,
    /// Deadlines that fired.
    pub fired: u64,
    /// Deadlines removed by [`DeadlineTimer::disarm`] before firing.
    pub cancelled: u64,
    /// Deadlines overwritten by a new `arm` before firing.
    pub replaced: u64,
    /// Firings later than the configured threshold.
    pub late: u64,
    /// Largest lateness observed.
    pub max_late: Duration,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// A re-armable single-shot deadline keyed by `K`.
///
/// One `DeadlineTimer` per room actor.
pub struct DeadlineTimer<K> {
    config: TimerConfig,
    armed: Option<(K, Instant)>,
    metrics: TimerMetrics,
}

impl<K: Copy + Eq + Debug> DeadlineTimer<K> {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            armed: None,
            metrics: TimerMetrics::default(),
        }
    }

    /// Arm the timer to fire at `deadline`, replacing any pending deadline.
    ///
    /// Arming with the key and deadline already pending is a no-op, so
    /// callers can re-sync after every command without inflating metrics.
    pub fn arm_at(&mut self, key: K, deadline: Instant) {
        if self.armed == Some((key, deadline)) {
            return;
        }
        if let Some((previous, _)) = self.armed.replace((key, deadline)) {
            trace!(?previous, ?key, "deadline replaced");
            self.bump(|m| m.replaced += 1);
        }
        debug!(
            ?key,
            in_ms = deadline
                .saturating_duration_since(Instant::now())
                .as_millis() as u64,
            "deadline armed"
        );
        self.bump(|m| m.armed += 1);
    }

    /// Remove the pending deadline, returning its key.
    pub fn disarm(&mut self) -> Option<K> {
        let (key, _) = self.armed.take()?;
        debug!(?key, "deadline disarmed");
        self.bump(|m| m.cancelled += 1);
        Some(key)
    }

    /// Wait for the pending deadline.
    ///
    /// Pends forever while disarmed. On completion the timer is disarmed.
    pub async fn wait(&mut self) -> Expiry<K> {
        let Some((key, deadline)) = self.armed else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        self.armed = None;
        let late_by = Instant::now().saturating_duration_since(deadline);
        let late = late_by > self.config.late_warn_threshold;
        if late {
            warn!(
                ?key,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "deadline fired late"
            );
        } else {
            trace!(?key, "deadline fired");
        }
        self.bump(|m| {
            m.fired += 1;
            if late {
                m.late += 1;
            }
            m.max_late = m.max_late.max(late_by);
        });

        Expiry {
            key,
            deadline,
            late_by,
        }
    }

    /// The pending deadline and its key.
    pub fn deadline(&self) -> Option<(K, Instant)> {
        self.armed
    }

    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }

    fn bump(&mut self, update: impl FnOnce(&mut TimerMetrics)) {
        if self.config.metrics_enabled {
            update(&mut self.metrics);
        }
    }
}

impl<K: Copy + Eq + Debug> Default for DeadlineTimer<K> {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}
