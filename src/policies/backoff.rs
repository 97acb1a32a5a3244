//! # Backoff between restarts.
//!
//! [`BackoffPolicy`] grows the restart delay of a task group's
//! [`RestartPolicy`](crate::RestartPolicy) with the number of failures already
//! seen in the current interval:
//!
//! `delay × factor^n`, clamped to [`BackoffPolicy::max`], then jittered.
//!
//! With the default `factor = 1.0` the delay is constant, which is the classic
//! "fixed delay" restart mode.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use allocvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     factor: 2.0,
//!     max: Duration::from_secs(10),
//!     jitter: JitterPolicy::None,
//! };
//! let delay = Duration::from_millis(100);
//!
//! assert_eq!(backoff.next(delay, 0), Duration::from_millis(100));
//! assert_eq!(backoff.next(delay, 1), Duration::from_millis(200));
//! assert_eq!(backoff.next(delay, 10), Duration::from_secs(10));
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Restart delay growth.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Multiplicative growth factor (`1.0` = constant delay).
    pub factor: f64,
    /// Upper bound for the computed delay.
    pub max: Duration,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant delay: `factor = 1.0`, `max = 30m`, no jitter.
    fn default() -> Self {
        Self {
            factor: 1.0,
            max: Duration::from_secs(30 * 60),
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Exponential growth by `factor`, capped at `max`.
    pub fn exponential(factor: f64, max: Duration) -> Self {
        Self {
            factor,
            max,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay before restart number `n` (0-indexed) given the base `delay`.
    ///
    /// The base for each `n` is derived independently, so jitter never feeds back.
    pub fn next(&self, delay: Duration, n: u32) -> Duration {
        let exp = n.min(i32::MAX as u32) as i32;
        let secs = delay.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}
