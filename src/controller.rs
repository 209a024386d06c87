// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Glue shared by every reconciliation loop.
//!
//! Reconcilers are plain `async fn(Arc<K>, Arc<Context>) -> anyhow::Result<Action>`.
//! [`instrument`] wraps them for `kube::runtime::Controller`: it records metrics,
//! turns optimistic-concurrency conflicts into a short requeue, and converts
//! every other failure into a [`ReconcileError`] handled by [`error_policy`].

use crate::constants::ERROR_REQUEUE_DURATION_SECS;
use crate::metrics::{
    record_error, record_reconciliation_error, record_reconciliation_requeue,
    record_reconciliation_success,
};
use crate::reconcilers::retry::{conflict_requeue, is_conflict_error};
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Reconciliation error wrapper
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// Runs one reconcile and records its outcome under `kind`.
///
/// # Errors
///
/// Returns the reconcile error unless it was a conflict, which is requeued.
pub async fn instrument<F>(kind: &'static str, fut: F) -> Result<Action, ReconcileError>
where
    F: Future<Output = anyhow::Result<Action>>,
{
    let start = Instant::now();
    match fut.await {
        Ok(action) => {
            record_reconciliation_success(kind, start.elapsed());
            Ok(action)
        }
        Err(e) if is_conflict_error(&e) => {
            debug!(kind = kind, error = %e, "Conflict, requeueing");
            record_reconciliation_requeue(kind, "conflict");
            Ok(conflict_requeue())
        }
        Err(e) => {
            record_reconciliation_error(kind, start.elapsed());
            record_error(kind, "reconcile_error");
            Err(ReconcileError(e))
        }
    }
}

/// Error policy shared by all controllers.
///
/// Returns an action to requeue the resource after a delay when reconciliation fails.
#[allow(clippy::needless_pass_by_value)] // Signature required by kube::runtime::Controller
pub fn error_policy<K, C>(resource: Arc<K>, err: &ReconcileError, _ctx: Arc<C>) -> Action
where
    K: ResourceExt,
{
    error!(
        error = %err,
        name = %resource.name_any(),
        namespace = ?resource.namespace(),
        "Reconciliation error - will retry in {}s",
        ERROR_REQUEUE_DURATION_SECS
    );
    Action::requeue(Duration::from_secs(ERROR_REQUEUE_DURATION_SECS))
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
