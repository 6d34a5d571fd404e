//! Bounded polling of asynchronous jobs.

use crate::error::{EvalError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Result of one poll attempt.
#[derive(Debug)]
pub enum PollOutcome<T> {
    /// Terminal value; stop polling.
    Ready(T),
    /// Not done yet; poll again after the next delay.
    Pending,
}

/// Interval, backoff, and deadline for a polling loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the first re-poll.
    pub interval: Duration,
    /// Multiplier applied to the delay after each pending poll.
    pub backoff_factor: f64,
    /// Ceiling for the delay.
    pub max_interval: Duration,
    /// Overall budget; `None` polls until a terminal state.
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            backoff_factor: 1.0,
            max_interval: Duration::from_secs(30),
            max_wait: Some(Duration::from_secs(1800)),
        }
    }
}

impl PollPolicy {
    /// Poll every `interval` with no deadline.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            backoff_factor: 1.0,
            max_interval: interval,
            max_wait: None,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor.max(1.0);
        self.max_interval = max_interval;
        self
    }

    /// Delay that follows `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        if self.backoff_factor.is_nan() || self.backoff_factor <= 1.0 {
            return current;
        }
        let cap = self.max_interval.max(self.interval);
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .unwrap_or(cap)
            .min(cap)
    }

    /// Call `probe` until it yields [`PollOutcome::Ready`] or errors.
    ///
    /// The first probe runs immediately. Before each sleep the deadline is
    /// checked; if the next sleep would overrun `max_wait` the loop stops with
    /// [`EvalError::PollTimeout`] naming `job_id`.
    pub async fn run<T, F, Fut>(&self, job_id: &str, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollOutcome<T>>>,
    {
        let started = Instant::now();
        let mut delay = self.interval;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if let PollOutcome::Ready(value) = probe().await? {
                return Ok(value);
            }

            let waited = started.elapsed();
            if let Some(max_wait) = self.max_wait {
                if waited + delay > max_wait {
                    tracing::warn!(job_id, attempts, ?waited, "giving up on pending job");
                    return Err(EvalError::PollTimeout {
                        job_id: job_id.to_string(),
                        waited,
                    });
                }
            }

            tracing::debug!(job_id, attempts, ?delay, "job pending");
            tokio::time::sleep(delay).await;
            delay = self.next_delay(delay);
        }
    }
}
