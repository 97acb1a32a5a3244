//! # Restart policy evaluator.
//!
//! [`RestartPolicy`] is the task-group restart configuration. It is immutable for
//! the lifetime of one allocation and is evaluated once per observed task failure:
//!
//! ```text
//! failure ──► RestartTracker::record_failure(now)
//!                 ├─ prune failures older than `interval`
//!                 └─ RestartPolicy::evaluate(window, now)
//!                        ├─ attempts == 0            ─► GiveUp
//!                        ├─ window.len() > attempts
//!                        │     ├─ RestartMode::Fail  ─► GiveUp
//!                        │     └─ RestartMode::Delay ─► Restart(rest of interval)
//!                        └─ otherwise                ─► Restart(backoff.next(delay, n))
//! ```
//!
//! ## Rules
//! - The evaluator is pure; all history lives in [`RestartTracker`].
//! - `interval = 0s` means failures never leave the window.
//! - Successful exits and fatal errors never reach the evaluator.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::policies::BackoffPolicy;

/// What happens once `attempts` is exceeded within `interval`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestartMode {
    /// Give up; the task becomes Dead and failed.
    #[default]
    Fail,
    /// Wait until the interval has elapsed, then start counting again.
    Delay,
}

/// Task-group restart policy.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestartPolicy {
    /// Restarts allowed within `interval` (`0` = never restart).
    pub attempts: u32,
    /// Sliding window over which failures are counted.
    pub interval: Duration,
    /// Base delay before a restart.
    pub delay: Duration,
    /// Behaviour when `attempts` is exceeded.
    pub mode: RestartMode,
    /// Growth of `delay` with repeated failures.
    pub backoff: BackoffPolicy,
}

impl Default for RestartPolicy {
    /// Two attempts per 30 minutes, 15s fixed delay, fail mode.
    fn default() -> Self {
        Self {
            attempts: 2,
            interval: Duration::from_secs(30 * 60),
            delay: Duration::from_secs(15),
            mode: RestartMode::Fail,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Result of evaluating a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartDecision {
    /// Start the task again after the given delay.
    Restart(Duration),
    /// Stop restarting; the task is terminally failed.
    GiveUp,
}

impl RestartPolicy {
    /// Policy that never restarts.
    pub fn never() -> Self {
        Self {
            attempts: 0,
            ..Self::default()
        }
    }

    /// Evaluates a failure.
    ///
    /// `window` holds the failure instants inside the current interval,
    /// including the one being evaluated, oldest first.
    pub fn evaluate(&self, window: &[Instant], now: Instant) -> RestartDecision {
        if self.attempts == 0 {
            return RestartDecision::GiveUp;
        }

        let failures = window.len() as u32;
        if failures > self.attempts {
            return match self.mode {
                RestartMode::Fail => RestartDecision::GiveUp,
                RestartMode::Delay => {
                    let elapsed = window
                        .first()
                        .map(|first| now.saturating_duration_since(*first))
                        .unwrap_or_default();
                    let rest = self.interval.saturating_sub(elapsed);
                    RestartDecision::Restart(rest.max(self.delay))
                }
            };
        }

        let n = failures.saturating_sub(1);
        RestartDecision::Restart(self.backoff.next(self.delay, n))
    }
}

/// Per-task failure history feeding [`RestartPolicy::evaluate`].
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    failures: Vec<Instant>,
}

impl RestartTracker {
    /// Creates an empty tracker for `policy`.
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            failures: Vec::new(),
        }
    }

    /// Records a failure at `now` and returns the decision for it.
    pub fn record_failure(&mut self, now: Instant) -> RestartDecision {
        let interval = self.policy.interval;
        if interval > Duration::ZERO {
            self.failures
                .retain(|at| now.saturating_duration_since(*at) < interval);
        }
        self.failures.push(now);

        let decision = self.policy.evaluate(&self.failures, now);
        if self.policy.mode == RestartMode::Delay
            && self.failures.len() as u32 > self.policy.attempts
            && matches!(decision, RestartDecision::Restart(_))
        {
            // the delayed restart opens a fresh window
            self.failures.clear();
        }
        decision
    }

    /// Failures currently inside the window.
    pub fn failures_in_window(&self) -> usize {
        self.failures.len()
    }
}
