// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Plan` scheduler.
//!
//! Each reconcile creates the `BackupJob` of the latest slot that came due
//! since the last scheduled one, records the schedule in the status and
//! requeues until the next slot. Job names are quantized to the minute, so a
//! retried reconcile for the same slot finds its job already there.

use super::{parse_timestamp, timestamp};
use crate::backup_crd::{BackupJob, BackupJobSpec, LocalObjectReference, Plan, PlanStatus};
use crate::context::Context;
use crate::naming::normalize_application_ref;
use crate::reconcilers::resources::{create_or_update, owner_reference, Operation};
use crate::reconcilers::status::{conditions_equal, patch_status, set_condition};
use crate::schedule::{job_name, plan_slots, Schedule};
use crate::status_reasons::{
    CONDITION_FALSE, CONDITION_TRUE, CONDITION_TYPE_READY, REASON_INVALID_SCHEDULE, REASON_SCHEDULED,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shortest requeue while waiting for a slot.
const MIN_SLOT_REQUEUE_SECS: u64 = 1;

/// `BackupJob` for one slot of `plan`.
#[must_use]
pub fn build_backup_job(plan: &Plan, slot: DateTime<Utc>) -> BackupJob {
    let mut job = BackupJob::new(
        &job_name(&plan.name_any(), slot),
        BackupJobSpec {
            application_ref: normalize_application_ref(&plan.spec.application_ref),
            backup_class_name: plan.spec.backup_class_name.clone(),
            plan_ref: Some(LocalObjectReference { name: plan.name_any() }),
        },
    );
    job.metadata.namespace = plan.namespace();
    job.metadata.owner_references = owner_reference(plan, true).map(|r| vec![r]);
    job
}

/// Time until `next`, never less than a second.
#[must_use]
pub fn requeue_after(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now)
        .to_std()
        .unwrap_or_default()
        .max(Duration::from_secs(MIN_SLOT_REQUEUE_SECS))
}

/// Whether `desired` differs from `current`, ignoring condition timestamps.
#[must_use]
pub fn status_changed(current: &PlanStatus, desired: &PlanStatus) -> bool {
    current.last_scheduled_time != desired.last_scheduled_time
        || current.next_scheduled_time != desired.next_scheduled_time
        || !conditions_equal(&current.conditions, &desired.conditions)
}

/// Reconciles one `Plan`.
///
/// # Errors
///
/// Returns an error if the job cannot be created or the status cannot be patched.
pub async fn reconcile_plan(ctx: Arc<Context>, plan: Arc<Plan>) -> Result<Action> {
    let name = plan.name_any();
    let namespace = plan.namespace().unwrap_or_default();
    let plans: Api<Plan> = Api::namespaced(ctx.client.clone(), &namespace);
    let original = plan.status.clone().unwrap_or_default();
    let mut status = original.clone();
    let generation = plan.metadata.generation;

    let schedule = match Schedule::parse(plan.spec.schedule.r#type, &plan.spec.schedule.value) {
        Ok(schedule) => schedule,
        Err(e) => {
            warn!(name = %name, namespace = %namespace, error = %e, "Invalid plan schedule");
            status.next_scheduled_time = None;
            set_condition(
                &mut status.conditions,
                CONDITION_TYPE_READY,
                CONDITION_FALSE,
                REASON_INVALID_SCHEDULE,
                &e.to_string(),
                generation,
            );
            if status_changed(&original, &status) {
                patch_status(&plans, &name, &status).await?;
            }
            return Ok(Action::await_change());
        }
    };

    let now = Utc::now();
    let anchor = plan
        .metadata
        .creation_timestamp
        .as_ref()
        .and_then(|t| DateTime::from_timestamp(t.0.as_second(), t.0.subsec_nanosecond() as u32))
        .unwrap_or(now);
    let last = status.last_scheduled_time.as_deref().and_then(parse_timestamp);
    let slots = plan_slots(&schedule, anchor, last, now);

    if let Some(slot) = slots.due {
        let jobs: Api<BackupJob> = Api::namespaced(ctx.client.clone(), &namespace);
        let job = build_backup_job(&plan, slot);
        let job_name = job.name_any();
        if create_or_update(&jobs, job, |_| Ok(())).await? == Operation::Created {
            info!(name = %name, namespace = %namespace, job = %job_name, slot = %slot, "Scheduled BackupJob");
        } else {
            debug!(name = %name, job = %job_name, "BackupJob for slot already exists");
        }
        status.last_scheduled_time = Some(timestamp(slot));
    }

    status.next_scheduled_time = slots.next.map(timestamp);
    let message = status
        .next_scheduled_time
        .as_deref()
        .map_or_else(|| "No further slots".to_string(), |next| format!("Next backup at {next}"));
    set_condition(
        &mut status.conditions,
        CONDITION_TYPE_READY,
        CONDITION_TRUE,
        REASON_SCHEDULED,
        &message,
        generation,
    );
    if status_changed(&original, &status) {
        patch_status(&plans, &name, &status).await?;
    }

    Ok(slots
        .next
        .map_or_else(Action::await_change, |next| Action::requeue(requeue_after(next, now))))
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod plan_tests;
