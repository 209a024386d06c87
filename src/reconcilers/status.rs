// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers.
//!
//! Every top-level object keeps exactly one `Ready` condition. Conditions are
//! built in memory with [`set_condition`], compared with [`conditions_equal`]
//! and persisted with a single status patch, so reconciles that change nothing
//! write nothing.
//!
//! # Example
//!
//! ```rust,no_run
//! use cozystack_operator::reconcilers::status::set_condition;
//! use cozystack_operator::crd::Condition;
//!
//! let mut conditions: Vec<Condition> = Vec::new();
//! set_condition(&mut conditions, "Ready", "True", "ReconciliationSucceeded", "done", Some(3));
//! assert_eq!(conditions.len(), 1);
//! ```

use crate::crd::Condition;
use crate::status_reasons::CONDITION_TYPE_READY;
use anyhow::{Context, Result};
use chrono::Utc;
use kube::api::{Patch, PatchParams};
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Create a new condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
        observed_generation: None,
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// The `Ready` condition, if any.
#[must_use]
pub fn ready_condition(conditions: &[Condition]) -> Option<&Condition> {
    find_condition(conditions, CONDITION_TYPE_READY)
}

/// Update or add a condition in place (no API call).
///
/// `lastTransitionTime` is preserved while the status value stays the same.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
    observed_generation: Option<i64>,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        if existing.status != status || existing.last_transition_time.is_none() {
            existing.last_transition_time = Some(Utc::now().to_rfc3339());
        }
        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.observed_generation = observed_generation;
    } else {
        let mut condition = create_condition(condition_type, status, reason, message);
        condition.observed_generation = observed_generation;
        conditions.push(condition);
    }
}

/// Compare two condition lists ignoring `lastTransitionTime`.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        find_condition(current, &new_cond.r#type).is_some_and(|curr| {
            curr.status == new_cond.status
                && curr.reason == new_cond.reason
                && curr.message == new_cond.message
                && curr.observed_generation == new_cond.observed_generation
        })
    })
}

/// Merge-patch the status subresource of `name`.
///
/// # Errors
///
/// Returns an error if the patch fails.
pub async fn patch_status<K, S>(api: &Api<K>, name: &str, status: &S) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
    S: Serialize,
{
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .with_context(|| format!("failed to patch status of {name}"))?;
    debug!(name = %name, "Patched status");
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
