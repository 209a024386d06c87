// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions for the `backups.cozystack.io` group.
//!
//! - [`BackupClass`] maps application kinds to driver strategies (cluster-scoped)
//! - [`BackupJob`] runs one backup of one application
//! - [`Plan`] produces `BackupJob`s on a schedule
//! - [`Backup`] records a completed backup artifact
//! - [`RestoreJob`] restores an application from a `Backup`

use crate::crd::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed reference to an object in the same namespace.
///
/// `api_group` is optional on the wire; [`crate::naming::normalize_application_ref`]
/// fills in the application group before any comparison.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TypedLocalObjectReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    pub kind: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    pub name: String,
}

// ============================================================================
// BackupClass
// ============================================================================

/// Application types a strategy applies to.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSelector {
    /// Defaults to `apps.cozystack.io`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
    pub kind: String,
}

/// One strategy of a `BackupClass`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupClassStrategy {
    /// Driver-specific strategy object, e.g. `strategy.backups.cozystack.io/Velero`.
    pub strategy_ref: TypedLocalObjectReference,

    pub application: ApplicationSelector,

    /// Strategy and storage parameters, e.g. `backupStorageLocationName`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupClassStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// `BackupClass` maps application kinds to backup strategies.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "backups.cozystack.io",
    version = "v1alpha1",
    kind = "BackupClass",
    doc = "BackupClass defines per-application-kind backup strategies referenced by BackupJobs and Plans."
)]
#[kube(status = "BackupClassStatus")]
#[serde(rename_all = "camelCase")]
pub struct BackupClassSpec {
    #[serde(default)]
    pub strategies: Vec<BackupClassStrategy>,
}

// ============================================================================
// BackupJob
// ============================================================================

/// Lifecycle phase of a `BackupJob` or `RestoreJob`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub enum JobPhase {
    #[default]
    #[serde(rename = "")]
    Empty,
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobPhase {
    /// Terminal phases are never left again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupJobStatus {
    #[serde(default)]
    pub phase: JobPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_ref: Option<LocalObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// `BackupJob` runs a single backup of one application.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "backups.cozystack.io",
    version = "v1alpha1",
    kind = "BackupJob",
    namespaced,
    doc = "BackupJob performs one backup of an application using the strategy resolved from its BackupClass.",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Class","type":"string","jsonPath":".spec.backupClassName"}"#
)]
#[kube(status = "BackupJobStatus")]
#[serde(rename_all = "camelCase")]
pub struct BackupJobSpec {
    pub application_ref: TypedLocalObjectReference,

    /// Immutable once set.
    #[serde(default)]
    pub backup_class_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_ref: Option<LocalObjectReference>,
}

// ============================================================================
// Plan
// ============================================================================

/// How a `Plan` schedule value is interpreted.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    #[default]
    Cron,
    Interval,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanSchedule {
    #[serde(default)]
    pub r#type: ScheduleType,
    /// 5-field cron expression or an interval such as `6h`.
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scheduled_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scheduled_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// `Plan` creates `BackupJob`s on a schedule.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "backups.cozystack.io",
    version = "v1alpha1",
    kind = "Plan",
    namespaced,
    doc = "Plan schedules BackupJobs for one application.",
    printcolumn = r#"{"name":"Schedule","type":"string","jsonPath":".spec.schedule.value"}"#,
    printcolumn = r#"{"name":"Next","type":"string","jsonPath":".status.nextScheduledTime"}"#
)]
#[kube(status = "PlanStatus")]
#[serde(rename_all = "camelCase")]
pub struct PlanSpec {
    pub application_ref: TypedLocalObjectReference,
    pub backup_class_name: String,
    pub schedule: PlanSchedule,
}

// ============================================================================
// Backup
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub enum BackupPhase {
    #[default]
    Pending,
    Ready,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackupArtifact {
    pub uri: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    #[serde(default)]
    pub phase: BackupPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<BackupArtifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// `Backup` records a completed backup produced by a driver.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "backups.cozystack.io",
    version = "v1alpha1",
    kind = "Backup",
    namespaced,
    doc = "Backup records the artifact produced by a BackupJob.",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Taken","type":"string","jsonPath":".spec.takenAt"}"#
)]
#[kube(status = "BackupStatus")]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    pub application_ref: TypedLocalObjectReference,
    pub strategy_ref: TypedLocalObjectReference,
    /// RFC3339 time at which the driver took the backup.
    pub taken_at: String,
    /// Driver-specific lookup data, e.g. the Velero backup name and namespace.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub driver_metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_ref: Option<LocalObjectReference>,
}

// ============================================================================
// RestoreJob
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreJobStatus {
    #[serde(default)]
    pub phase: JobPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// `RestoreJob` restores an application from a `Backup`.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "backups.cozystack.io",
    version = "v1alpha1",
    kind = "RestoreJob",
    namespaced,
    doc = "RestoreJob restores an application from a Backup. Without targetApplicationRef the backup's own application is restored.",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Backup","type":"string","jsonPath":".spec.backupRef.name"}"#
)]
#[kube(status = "RestoreJobStatus")]
#[serde(rename_all = "camelCase")]
pub struct RestoreJobSpec {
    pub backup_ref: LocalObjectReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_application_ref: Option<TypedLocalObjectReference>,
}

#[cfg(test)]
#[path = "backup_crd_tests.rs"]
mod backup_crd_tests;
