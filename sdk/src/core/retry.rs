//! # Docker SDK Retry Helper
//!
//! File: sdk/src/core/retry.rs
//!
//! ## Overview
//!
//! Exponential backoff with full jitter for daemon operations that can fail
//! transiently (image pull, image build). The caller supplies a classifier;
//! errors it reports as permanent are returned immediately.
//!
//! Cancellation follows the async model: dropping the returned future aborts the
//! retry loop at its next await point, including while sleeping between attempts.
//!
use crate::core::error::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Upper bound of the first sleep.
    pub initial_interval: Duration,
    /// Growth factor applied to the bound after every failure.
    pub multiplier: f64,
    /// Ceiling for the bound.
    pub max_interval: Duration,
    /// Total time budget across attempts. `None` retries until success or a
    /// permanent error.
    pub max_elapsed: Option<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 1.5,
            max_interval: Duration::from_secs(60),
            max_elapsed: Some(Duration::from_secs(15 * 60)),
        }
    }
}

impl Backoff {
    /// A policy with tiny intervals, for tests.
    pub fn fast() -> Self {
        Self {
            initial_interval: Duration::from_millis(1),
            multiplier: 1.0,
            max_interval: Duration::from_millis(1),
            max_elapsed: Some(Duration::from_secs(5)),
        }
    }

    fn next_bound(&self, current: Duration) -> Duration {
        let grown = current.mul_f64(self.multiplier.max(1.0));
        grown.min(self.max_interval)
    }
}

/// Runs `op` until it succeeds, fails permanently, or the policy budget is spent.
///
/// Each sleep is drawn uniformly from `[0, bound]` (full jitter). The last error
/// is returned when the budget runs out.
pub async fn retry<T, F, Fut, P>(policy: &Backoff, what: &str, mut op: F, is_permanent: P) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&anyhow::Error) -> bool,
{
    let started = Instant::now();
    let mut bound = policy.initial_interval;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "{} succeeded after retrying", what);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if is_permanent(&err) {
            debug!(attempt, error = %err, "{} failed permanently", what);
            return Err(err);
        }

        let sleep_for = if bound.is_zero() {
            Duration::ZERO
        } else {
            let upper = bound.as_nanos().min(u128::from(u64::MAX)) as u64;
            Duration::from_nanos(rand::thread_rng().gen_range(0..=upper))
        };

        if let Some(budget) = policy.max_elapsed {
            if started.elapsed() + sleep_for > budget {
                warn!(attempt, error = %err, "{} giving up, retry budget exhausted", what);
                return Err(err);
            }
        }

        warn!(attempt, error = %err, backoff = ?sleep_for, "{} failed, retrying", what);
        tokio::time::sleep(sleep_for).await;
        bound = policy.next_bound(bound);
    }
}
