// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `RestoreJob` reconciliation.
//!
//! The strategy comes from the referenced `Backup`, not from a class. Every
//! problem with the backup or its strategy fails the job; terminal phases are
//! never left.

use super::driver::{driver_for, DriverProgress};
use super::{parse_timestamp, timestamp};
use crate::backup_crd::{Backup, JobPhase, RestoreJob, RestoreJobStatus, TypedLocalObjectReference};
use crate::constants::{DRIVER_POLL_REQUEUE_SECS, KIND_RESTORE_JOB, STRATEGY_API_GROUP};
use crate::context::Context;
use crate::metrics::record_reconciliation_requeue;
use crate::naming::normalize_application_ref;
use crate::reconcilers::status::{patch_status, set_condition};
use crate::status_reasons::{
    CONDITION_FALSE, CONDITION_TRUE, CONDITION_TYPE_READY, REASON_RESTORE_FAILED, REASON_RESTORE_SUCCEEDED,
};
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Application a restore writes into: the explicit target, else the backup's
/// own application. Always normalized.
#[must_use]
pub fn target_application(job: &RestoreJob, backup: &Backup) -> TypedLocalObjectReference {
    normalize_application_ref(
        job.spec
            .target_application_ref
            .as_ref()
            .unwrap_or(&backup.spec.application_ref),
    )
}

/// Why `backup` cannot be restored by any driver here, if so.
#[must_use]
pub fn strategy_problem(backup: &Backup) -> Option<String> {
    match backup.spec.strategy_ref.api_group.as_deref() {
        None | Some("") => Some("Backup has no strategyRef.apiGroup".to_string()),
        Some(group) if group != STRATEGY_API_GROUP => {
            Some(format!("strategyRef.apiGroup doesn't match: {group}"))
        }
        Some(_) => None,
    }
}

pub fn mark_running(status: &mut RestoreJobStatus, now: DateTime<Utc>) -> bool {
    if status.started_at.as_deref().and_then(parse_timestamp).is_some() {
        return false;
    }
    status.started_at = Some(timestamp(now));
    status.phase = JobPhase::Running;
    true
}

pub fn mark_failed(status: &mut RestoreJobStatus, message: &str, now: DateTime<Utc>, generation: Option<i64>) {
    status.phase = JobPhase::Failed;
    status.completed_at = Some(timestamp(now));
    status.message = Some(message.to_string());
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_FALSE,
        REASON_RESTORE_FAILED,
        message,
        generation,
    );
}

pub fn mark_succeeded(status: &mut RestoreJobStatus, now: DateTime<Utc>, generation: Option<i64>) {
    status.phase = JobPhase::Succeeded;
    status.completed_at = Some(timestamp(now));
    status.message = None;
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_TRUE,
        REASON_RESTORE_SUCCEEDED,
        "Restore completed",
        generation,
    );
}

async fn fail(api: &Api<RestoreJob>, job: &RestoreJob, mut status: RestoreJobStatus, message: &str) -> Result<Action> {
    mark_failed(&mut status, message, Utc::now(), job.metadata.generation);
    patch_status(api, &job.name_any(), &status).await?;
    warn!(name = %job.name_any(), namespace = ?job.namespace(), message = %message, "RestoreJob failed");
    Ok(Action::await_change())
}

/// Reconciles one `RestoreJob`.
///
/// # Errors
///
/// Returns an error when the driver fails to talk to its engine or a status
/// patch fails.
pub async fn reconcile_restore_job(ctx: Arc<Context>, job: Arc<RestoreJob>) -> Result<Action> {
    let name = job.name_any();
    let namespace = job.namespace().unwrap_or_default();
    let mut status = job.status.clone().unwrap_or_default();
    if status.phase.is_terminal() {
        return Ok(Action::await_change());
    }

    let api: Api<RestoreJob> = Api::namespaced(ctx.client.clone(), &namespace);
    let backups: Api<Backup> = Api::namespaced(ctx.client.clone(), &namespace);
    let backup_name = &job.spec.backup_ref.name;
    let backup = match backups
        .get_opt(backup_name)
        .await
        .with_context(|| format!("failed to get Backup {backup_name}"))?
    {
        Some(backup) => backup,
        None => return fail(&api, &job, status, &format!("Backup {backup_name} not found")).await,
    };

    if let Some(problem) = strategy_problem(&backup) {
        return fail(&api, &job, status, &problem).await;
    }
    let kind = backup.spec.strategy_ref.kind.clone();
    let Some(driver) = driver_for(&kind, &ctx.client) else {
        return fail(&api, &job, status, &format!("strategyRef.kind not supported: {kind}")).await;
    };

    let target = target_application(&job, &backup);
    if mark_running(&mut status, Utc::now()) {
        patch_status(&api, &name, &status).await?;
        info!(
            name = %name,
            namespace = %namespace,
            backup = %backup_name,
            target = %target.name,
            driver = driver.kind(),
            "Started RestoreJob"
        );
    }

    match driver.restore(&job, &backup, &target).await? {
        DriverProgress::InProgress => {
            record_reconciliation_requeue(KIND_RESTORE_JOB, "driver_poll");
            Ok(Action::requeue(Duration::from_secs(DRIVER_POLL_REQUEUE_SECS)))
        }
        DriverProgress::Completed(_) => {
            mark_succeeded(&mut status, Utc::now(), job.metadata.generation);
            patch_status(&api, &name, &status).await?;
            info!(name = %name, namespace = %namespace, "RestoreJob succeeded");
            Ok(Action::await_change())
        }
        DriverProgress::Failed(message) => fail(&api, &job, status, &message).await,
    }
}

#[cfg(test)]
#[path = "restorejob_tests.rs"]
mod restorejob_tests;
