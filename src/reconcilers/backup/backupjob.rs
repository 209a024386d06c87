// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `BackupJob` reconciliation.
//!
//! Resolves the job's class into a strategy, hands the strategy to its driver
//! and polls the driver until it finishes. A completed backup is recorded as a
//! `Backup` owned by the job. `Succeeded` and `Failed` are final.

use super::class_resolver::{resolve_backup_class, ResolveError, ResolvedBackupConfig};
use super::driver::{driver_for, DriverArtifact, DriverProgress};
use super::{parse_timestamp, timestamp};
use crate::backup_crd::{
    Backup, BackupArtifact, BackupJob, BackupJobStatus, BackupPhase, BackupSpec, BackupStatus, JobPhase,
    LocalObjectReference,
};
use crate::constants::{DRIVER_POLL_REQUEUE_SECS, KIND_BACKUP_JOB, STRATEGY_API_GROUP};
use crate::context::Context;
use crate::metrics::record_reconciliation_requeue;
use crate::naming::normalize_application_ref;
use crate::reconcilers::resources::{create_or_update, owner_reference};
use crate::reconcilers::status::{conditions_equal, patch_status, set_condition};
use crate::status_reasons::{
    CONDITION_FALSE, CONDITION_TRUE, CONDITION_TYPE_READY, REASON_BACKUP_CLASS_NOT_FOUND, REASON_BACKUP_FAILED,
    REASON_BACKUP_SUCCEEDED, REASON_NO_MATCHING_STRATEGY,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Name of the `Backup` recorded for a job.
#[must_use]
pub fn backup_name(job: &str) -> String {
    format!("{job}-backup")
}

/// Moves a fresh job to `Running`. Returns the start time and whether the
/// status changed.
pub fn mark_running(status: &mut BackupJobStatus, now: DateTime<Utc>) -> (DateTime<Utc>, bool) {
    if let Some(started) = status.started_at.as_deref().and_then(parse_timestamp) {
        return (started, false);
    }
    status.started_at = Some(timestamp(now));
    status.phase = JobPhase::Running;
    (now, true)
}

pub fn mark_failed(status: &mut BackupJobStatus, message: &str, now: DateTime<Utc>, generation: Option<i64>) {
    status.phase = JobPhase::Failed;
    status.completed_at = Some(timestamp(now));
    status.message = Some(message.to_string());
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_FALSE,
        REASON_BACKUP_FAILED,
        message,
        generation,
    );
}

pub fn mark_succeeded(status: &mut BackupJobStatus, backup: &str, now: DateTime<Utc>, generation: Option<i64>) {
    status.phase = JobPhase::Succeeded;
    status.completed_at = Some(timestamp(now));
    status.backup_ref = Some(LocalObjectReference { name: backup.to_string() });
    status.message = None;
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_TRUE,
        REASON_BACKUP_SUCCEEDED,
        &format!("Backup {backup} is ready"),
        generation,
    );
}

/// Condition reason recorded for a class resolution failure. API errors have
/// none: they are transient and left to the retry policy.
#[must_use]
pub fn resolve_failure_reason(error: &ResolveError) -> Option<&'static str> {
    match error {
        ResolveError::ClassNotFound(_) => Some(REASON_BACKUP_CLASS_NOT_FOUND),
        ResolveError::NoMatchingStrategy { .. } => Some(REASON_NO_MATCHING_STRATEGY),
        ResolveError::Api { .. } => None,
    }
}

/// `Backup` recording the artifact produced for `job`.
#[must_use]
pub fn build_backup(
    job: &BackupJob,
    config: &ResolvedBackupConfig,
    artifact: Option<&DriverArtifact>,
    started_at: DateTime<Utc>,
) -> Backup {
    let spec = BackupSpec {
        application_ref: normalize_application_ref(&job.spec.application_ref),
        strategy_ref: config.strategy_ref.clone(),
        taken_at: artifact
            .and_then(|a| a.taken_at.clone())
            .unwrap_or_else(|| timestamp(started_at)),
        driver_metadata: artifact.map(|a| a.metadata.clone()).unwrap_or_default(),
        plan_ref: job.spec.plan_ref.clone(),
    };
    let mut backup = Backup::new(&backup_name(&job.name_any()), spec);
    backup.metadata.namespace = job.namespace();
    backup.metadata.owner_references = owner_reference(job, true).map(|r| vec![r]);
    backup
}

async fn record_backup(
    ctx: &Context,
    job: &BackupJob,
    config: &ResolvedBackupConfig,
    artifact: Option<&DriverArtifact>,
    started_at: DateTime<Utc>,
) -> Result<String> {
    let namespace = job.namespace().unwrap_or_default();
    let api: Api<Backup> = Api::namespaced(ctx.client.clone(), &namespace);
    let backup = build_backup(job, config, artifact, started_at);
    let name = backup.name_any();
    create_or_update(&api, backup, |_| Ok(())).await?;
    let status = BackupStatus {
        phase: BackupPhase::Ready,
        artifact: artifact.map(|a| BackupArtifact { uri: a.uri.clone() }),
        conditions: Vec::new(),
    };
    patch_status(&api, &name, &status).await?;
    Ok(name)
}

/// Reconciles one `BackupJob`.
///
/// # Errors
///
/// Returns an error when the class cannot be resolved (a missing class or
/// strategy is recorded in the status first), the driver fails to talk to its engine, or a status patch fails.
pub async fn reconcile_backup_job(ctx: Arc<Context>, job: Arc<BackupJob>) -> Result<Action> {
    let name = job.name_any();
    let namespace = job.namespace().unwrap_or_default();
    let original = job.status.clone().unwrap_or_default();
    if original.phase.is_terminal() {
        return Ok(Action::await_change());
    }

    let api: Api<BackupJob> = Api::namespaced(ctx.client.clone(), &namespace);
    let generation = job.metadata.generation;
    let mut status = original.clone();

    let config = match resolve_backup_class(&ctx.client, &job.spec.backup_class_name, &job.spec.application_ref).await {
        Ok(config) => config,
        Err(e) => {
            let Some(reason) = resolve_failure_reason(&e) else {
                warn!(name = %name, namespace = %namespace, error = %e, "Failed to resolve BackupClass, retrying");
                return Err(e.into());
            };
            set_condition(
                &mut status.conditions,
                CONDITION_TYPE_READY,
                CONDITION_FALSE,
                reason,
                &e.to_string(),
                generation,
            );
            status.message = Some(e.to_string());
            if !conditions_equal(&original.conditions, &status.conditions) {
                patch_status(&api, &name, &status).await?;
            }
            return Err(e.into());
        }
    };

    if config.strategy_ref.api_group.as_deref() != Some(STRATEGY_API_GROUP) {
        info!(
            name = %name,
            namespace = %namespace,
            group = ?config.strategy_ref.api_group,
            "Strategy group not handled here, skipping BackupJob"
        );
        return Ok(Action::await_change());
    }
    let Some(driver) = driver_for(&config.strategy_ref.kind, &ctx.client) else {
        warn!(name = %name, namespace = %namespace, kind = %config.strategy_ref.kind, "Unsupported strategy kind, skipping BackupJob");
        return Ok(Action::await_change());
    };

    let (started_at, started) = mark_running(&mut status, Utc::now());
    if started {
        patch_status(&api, &name, &status).await?;
        info!(name = %name, namespace = %namespace, driver = driver.kind(), "Started BackupJob");
    }

    match driver.backup(&job, started_at, &config).await? {
        DriverProgress::InProgress => {
            record_reconciliation_requeue(KIND_BACKUP_JOB, "driver_poll");
            Ok(Action::requeue(Duration::from_secs(DRIVER_POLL_REQUEUE_SECS)))
        }
        DriverProgress::Completed(artifact) => {
            let backup = record_backup(&ctx, &job, &config, artifact.as_ref(), started_at).await?;
            mark_succeeded(&mut status, &backup, Utc::now(), generation);
            patch_status(&api, &name, &status).await?;
            info!(name = %name, namespace = %namespace, backup = %backup, "BackupJob succeeded");
            Ok(Action::await_change())
        }
        DriverProgress::Failed(message) => {
            mark_failed(&mut status, &message, Utc::now(), generation);
            patch_status(&api, &name, &status).await?;
            warn!(name = %name, namespace = %namespace, message = %message, "BackupJob failed");
            Ok(Action::await_change())
        }
    }
}

#[cfg(test)]
#[path = "backupjob_tests.rs"]
mod backupjob_tests;
