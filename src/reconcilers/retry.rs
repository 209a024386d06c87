// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes API error classification and retry with exponential backoff.
//!
//! Reconcilers distinguish three classes of API failure:
//!
//! - **Not found** (404): the object is gone or not created yet; exit cleanly.
//! - **Conflict** (409): optimistic concurrency lost; requeue shortly.
//! - **Transient** (429, 5xx, transport): retried inline by [`retry_api_call`].

use anyhow::Result;
use kube::runtime::controller::Action;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::constants::CONFLICT_REQUEUE_DURATION_MILLIS;

/// Maximum total time to spend retrying (2 minutes)
const MAX_ELAPSED_TIME_SECS: u64 = 120;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (10 seconds)
const MAX_INTERVAL_SECS: u64 = 10;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Exponential backoff with jitter.
pub struct ExponentialBackoff {
    pub current_interval: Duration,
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed_time: Option<Duration>,
    pub multiplier: f64,
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        multiplier: f64,
        randomization_factor: f64,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_elapsed_time,
            multiplier,
            randomization_factor,
            start_time: Instant::now(),
        }
    }

    /// Next backoff interval, or `None` once the elapsed budget is spent.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let offset = rand::random::<f64>() * 2.0 * delta;

        Duration::from_secs_f64((secs - delta + offset).max(0.0))
    }
}

/// Backoff used for Kubernetes API retries.
///
/// 100ms doubling up to 10s per attempt, with a 2 minute budget.
#[must_use]
pub fn default_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(MAX_INTERVAL_SECS),
        Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
        BACKOFF_MULTIPLIER,
        RANDOMIZATION_FACTOR,
    )
}

/// Whether the error is a Kubernetes 404.
#[must_use]
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

/// Whether the error is a Kubernetes 409 (resource version conflict or already exists).
#[must_use]
pub fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 409)
}

/// Whether an `anyhow` chain contains a Kubernetes 409.
#[must_use]
pub fn is_conflict_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<kube::Error>())
        .any(is_conflict)
}

/// Short requeue used after losing an optimistic-concurrency race.
#[must_use]
pub fn conflict_requeue() -> Action {
    Action::requeue(Duration::from_millis(CONFLICT_REQUEUE_DURATION_MILLIS))
}

/// Whether a Kubernetes error is transient: 429, 5xx or a transport failure.
pub(crate) fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == 429 || (api_err.code >= 500 && api_err.code < 600)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

/// Retries a Kubernetes API call on transient errors with exponential backoff.
///
/// Permanent errors (4xx other than 429) are returned immediately.
///
/// # Errors
///
/// Returns the last error once it is not retryable or the backoff budget is spent.
///
/// # Example
///
/// ```no_run
/// use kube::{Api, Client};
/// use cozystack_operator::backup_crd::BackupClass;
/// use cozystack_operator::reconcilers::retry::retry_api_call;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = Client::try_default().await?;
/// let api: Api<BackupClass> = Api::all(client);
/// let class = retry_api_call(|| api.get("velero"), "get backup class velero").await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = default_backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Kubernetes API call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    return Err(e.into());
                }

                if let Some(duration) = backoff.next_backoff() {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Retryable Kubernetes API error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Backoff exhausted, giving up"
                    );
                    return Err(anyhow::anyhow!(
                        "Backoff exhausted after {attempt} attempts: {e}"
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
