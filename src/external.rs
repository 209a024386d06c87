// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kinds owned by other controllers that the operator reads and writes.
//!
//! These CRDs are never installed by this operator. Release, generator, git source
//! and workload monitor objects are typed; the dashboard records and the Velero
//! kinds carry free-form specs and are addressed as `DynamicObject`s through the
//! `ApiResource`s defined here.

use crate::crd::{Condition, GitRef, LocalObjectReference};
use kube::api::{ApiResource, GroupVersionKind};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// HelmRelease (helm.toolkit.fluxcd.io/v2)
// ============================================================================

/// Namespaced reference to a chart source or artifact.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrossNamespaceSourceReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartTemplateSpec {
    pub chart: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub source_ref: CrossNamespaceSourceReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconcile_strategy: Option<String>,
}

/// Legacy inline chart definition.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartTemplate {
    pub spec: HelmChartTemplateSpec,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Remediation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
}

/// Another release that must be ready first.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct DependencyReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Source of additional values merged at install time.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValuesReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

/// One entry of the release history, newest first.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub chart_name: String,
    #[serde(default)]
    pub chart_version: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Snapshot>,
}

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "helm.toolkit.fluxcd.io",
    version = "v2",
    kind = "HelmRelease",
    namespaced
)]
#[kube(status = "HelmReleaseStatus")]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<HelmChartTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_ref: Option<CrossNamespaceSourceReference>,
    #[serde(default)]
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<ReleaseAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade: Option<ReleaseAction>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<DependencyReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_from: Vec<ValuesReference>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub suspend: bool,
}

impl HelmRelease {
    /// Chart version of the newest history entry.
    #[must_use]
    pub fn chart_version(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.history.first())
            .map(|h| h.chart_version.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Chart name the release installs, from the inline chart or the chart reference.
    #[must_use]
    pub fn chart_name(&self) -> Option<&str> {
        if let Some(chart) = &self.spec.chart {
            return Some(chart.spec.chart.as_str());
        }
        self.spec.chart_ref.as_ref().map(|r| r.name.as_str())
    }
}

// ============================================================================
// ArtifactGenerator (source.extensions.fluxcd.io/v1beta1)
// ============================================================================

/// Source a generator reads from, addressed in copy paths as `@{alias}`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    pub alias: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Copy strategy of a copy operation.
pub const STRATEGY_OVERWRITE: &str = "Overwrite";
pub const STRATEGY_MERGE: &str = "Merge";

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CopyOperation {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutputArtifact {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_revision: Option<String>,
    #[serde(default)]
    pub copy: Vec<CopyOperation>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactGeneratorStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "source.extensions.fluxcd.io",
    version = "v1beta1",
    kind = "ArtifactGenerator",
    namespaced
)]
#[kube(status = "ArtifactGeneratorStatus")]
#[serde(rename_all = "camelCase")]
pub struct ArtifactGeneratorSpec {
    #[serde(default)]
    pub sources: Vec<SourceReference>,
    #[serde(default, rename = "artifacts")]
    pub output_artifacts: Vec<OutputArtifact>,
}

// ============================================================================
// GitRepository (source.toolkit.fluxcd.io/v1)
// ============================================================================

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "source.toolkit.fluxcd.io",
    version = "v1",
    kind = "GitRepository",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<GitRef>,
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
}

// ============================================================================
// WorkloadMonitor (cozystack.io/v1alpha1)
// ============================================================================

#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "cozystack.io",
    version = "v1alpha1",
    kind = "WorkloadMonitor",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadMonitorSpec {
    #[serde(default)]
    pub selector: BTreeMap<String, String>,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,
}

// ============================================================================
// Dynamically addressed kinds
// ============================================================================

fn api_resource(group: &str, version: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, kind), plural)
}

/// `dashboard.cozystack.io/v1alpha1 CustomFormsOverride` (cluster-scoped)
#[must_use]
pub fn custom_forms_override_resource() -> ApiResource {
    api_resource(
        "dashboard.cozystack.io",
        "v1alpha1",
        "CustomFormsOverride",
        "customformsoverrides",
    )
}

/// `dashboard.cozystack.io/v1alpha1 CFOMapping` (cluster-scoped singleton `cfomapping`)
#[must_use]
pub fn cfo_mapping_resource() -> ApiResource {
    api_resource("dashboard.cozystack.io", "v1alpha1", "CFOMapping", "cfomappings")
}

/// `dashboard.cozystack.io/v1alpha1 Navigation` (cluster-scoped singleton `navigation`)
#[must_use]
pub fn navigation_resource() -> ApiResource {
    api_resource("dashboard.cozystack.io", "v1alpha1", "Navigation", "navigations")
}

/// `velero.io/v1 Backup`
#[must_use]
pub fn velero_backup_resource() -> ApiResource {
    api_resource("velero.io", "v1", "Backup", "backups")
}

/// `velero.io/v1 Restore`
#[must_use]
pub fn velero_restore_resource() -> ApiResource {
    api_resource("velero.io", "v1", "Restore", "restores")
}

/// `strategy.backups.cozystack.io/v1alpha1 Velero` (cluster-scoped)
#[must_use]
pub fn velero_strategy_resource() -> ApiResource {
    api_resource(
        crate::constants::STRATEGY_API_GROUP,
        "v1alpha1",
        crate::constants::KIND_VELERO_STRATEGY,
        "veleros",
    )
}

#[cfg(test)]
#[path = "external_tests.rs"]
mod external_tests;
