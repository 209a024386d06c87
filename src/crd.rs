// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for platform orchestration.
//!
//! This module defines the operator-owned kinds in the `cozystack.io` group.
//! Backup kinds live in [`crate::backup_crd`]; kinds owned by other controllers
//! (releases, generators, dashboard records) live in [`crate::external`].
//!
//! # Resource Types
//!
//! ## Packaging
//!
//! - [`PackageSource`] - Named variants of installable components and libraries
//! - [`Package`] - Selects one variant of a same-named `PackageSource`
//! - [`Bundle`] - Flat package list with cross-bundle dependency targets
//!
//! ## Platform
//!
//! - [`Platform`] - Root chart installed from a source reference
//! - [`PlatformConfiguration`] - Root chart installed from a git URL
//!
//! ## Applications
//!
//! - [`ApplicationDefinition`] - One user-visible application kind: UI schema,
//!   release pointer, subresource selectors and workload monitor templates
//!
//! # Example: Selecting a Variant
//!
//! ```rust,no_run
//! use cozystack_operator::crd::{PackageComponentOverride, PackageSpec};
//! use std::collections::BTreeMap;
//!
//! let mut components = BTreeMap::new();
//! components.insert(
//!     "primary".to_string(),
//!     PackageComponentOverride { enabled: Some(true), values: None },
//! );
//!
//! let spec = PackageSpec {
//!     variant: Some("ha".to_string()),
//!     ignore_dependencies: vec![],
//!     components,
//! };
//! ```

use kube::CustomResource;
use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema for free-form values blobs.
///
/// Values are arbitrary chart input, so the API server must keep unknown fields.
pub fn preserve_unknown_fields(_gen: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Every resource maintains exactly one `Ready` condition.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,

    /// Generation of the resource the condition was computed from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// Reference to an external source object (git or OCI repository).
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    /// Kind of the source, e.g. `GitRepository` or `OCIRepository`.
    pub kind: String,

    /// Name of the source object.
    pub name: String,

    /// Namespace of the source object.
    pub namespace: String,

    /// Sub-path inside the source used as the base for all component paths.
    ///
    /// `/` or empty means the repository root. When unset, git sources default
    /// to `packages` and OCI sources to the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

// ============================================================================
// PackageSource
// ============================================================================

/// A library chart that components may vendor under `charts/`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    /// Library name. Defaults to the last segment of `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Path of the library chart relative to the source base path.
    pub path: String,
}

/// Install section of a component. Components without one produce an artifact only.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInstall {
    /// Release name. Defaults to the component name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_name: Option<String>,

    /// Target namespace. Defaults to the hub namespace for the release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Marks the target namespace privileged for pod security.
    #[serde(default)]
    pub privileged: bool,

    /// Component is not installed unless a `Package` enables it.
    #[serde(default)]
    pub disabled: bool,

    /// Names of other components in the same variant this one depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// One installable chart inside a variant.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component name, unique within the variant.
    pub name: String,

    /// Chart path relative to the source base path. Components without a path are skipped.
    #[serde(default)]
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<ComponentInstall>,

    /// Library names resolved against the union of all variant libraries.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,

    /// Values files (relative to the component path) overlaid onto `values.yaml`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_files: Vec<String>,
}

/// A named alternative set of components.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// Variant name, unique within the `PackageSource`.
    pub name: String,

    /// Other `Package` names whose installable components every release here depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<Library>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<Component>,
}

/// `PackageSource` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageSourceStatus {
    /// Comma-joined variant names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// `PackageSource` declares a set of variants, each a list of components built
/// from a single source repository.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "cozystack.io",
    version = "v1alpha1",
    kind = "PackageSource",
    shortname = "pks",
    doc = "PackageSource declares named variants of installable components. The operator turns it into one ArtifactGenerator in the hub namespace.",
    printcolumn = r#"{"name":"Variants","type":"string","jsonPath":".status.variants"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Status","type":"string","priority":1,"jsonPath":".status.conditions[?(@.type==\"Ready\")].message"}"#
)]
#[kube(status = "PackageSourceStatus")]
#[serde(rename_all = "camelCase")]
pub struct PackageSourceSpec {
    /// Source repository. Without it, nothing is generated and readiness is `Unknown`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<SourceRef>,

    #[serde(default)]
    pub variants: Vec<Variant>,
}

// ============================================================================
// Package
// ============================================================================

/// Per-component overrides on a `Package`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageComponentOverride {
    /// `false` disables an otherwise installable component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Values written verbatim into the component's release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: Option<serde_json::Value>,
}

/// `Package` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// `Package` selects a variant of its same-named `PackageSource` and installs it.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "cozystack.io",
    version = "v1alpha1",
    kind = "Package",
    shortname = "pkg",
    doc = "Package selects one variant of the PackageSource with the same name and emits one release per installable component.",
    printcolumn = r#"{"name":"Variant","type":"string","jsonPath":".spec.variant"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Status","type":"string","priority":1,"jsonPath":".status.conditions[?(@.type==\"Ready\")].message"}"#
)]
#[kube(status = "PackageStatus")]
#[serde(rename_all = "camelCase")]
pub struct PackageSpec {
    /// Variant name. Defaults to `default`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,

    /// Cross-package dependencies of the variant that are not enforced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore_dependencies: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<String, PackageComponentOverride>,
}

// ============================================================================
// Bundle
// ============================================================================

/// What happens to emitted objects when a `Bundle` goes away.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub enum DeletionPolicy {
    /// Emitted objects are owner-referenced and cascade-deleted.
    #[default]
    Delete,
    /// Emitted objects carry no owner reference and survive the bundle.
    Orphan,
}

/// Named group of packages other bundles can depend on.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleDependencyTarget {
    pub name: String,
    #[serde(default)]
    pub packages: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleLibrary {
    pub name: String,
    pub path: String,
}

/// A standalone artifact that packages may reference by name.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundleArtifact {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,
}

/// One release of a `Bundle`.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BundlePackage {
    /// Release object name.
    pub name: String,

    /// Release name inside the release engine.
    #[serde(default)]
    pub release_name: String,

    /// Chart path. Either this or `artifact` must be set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Name of an entry in the bundle's `artifacts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,

    pub namespace: String,

    #[serde(default)]
    pub privileged: bool,

    #[serde(default)]
    pub disabled: bool,

    /// Package names (in any bundle) this release depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_files: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Labels merged onto the target namespace.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespace_labels: BTreeMap<String, String>,
}

/// `Bundle` is a flat list of packages built and installed as one unit.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "cozystack.io",
    version = "v1alpha1",
    kind = "Bundle",
    doc = "Bundle is a flat package list addressable as a single unit. It emits artifact generators and releases directly."
)]
#[serde(rename_all = "camelCase")]
pub struct BundleSpec {
    pub source_ref: SourceRef,

    /// Base path inside the source. Same defaults as [`SourceRef::path`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,

    /// Entries of the form `bundleName/target`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_targets: Vec<BundleDependencyTarget>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<BundleLibrary>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<BundleArtifact>,

    #[serde(default)]
    pub packages: Vec<BundlePackage>,

    #[serde(default)]
    pub deletion_policy: DeletionPolicy,

    /// Labels copied onto every emitted object.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

// ============================================================================
// Platform
// ============================================================================

/// `Platform` installs the root platform chart from a source reference.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "cozystack.io",
    version = "v1alpha1",
    kind = "Platform",
    doc = "Platform installs the root platform chart from a source reference into the hub namespace."
)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSpec {
    pub source_ref: SourceRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: Option<serde_json::Value>,

    /// Release reconcile interval. Defaults to `5m`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Chart path inside the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
}

/// Git reference of a platform configuration source.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GitRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    pub name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfigurationSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#ref: Option<GitRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<LocalObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfigurationChart {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

/// `PlatformConfiguration` installs the root chart straight from a git URL.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "cozystack.io",
    version = "v1alpha1",
    kind = "PlatformConfiguration",
    doc = "PlatformConfiguration creates a git source and a release of the chart found at the given path."
)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfigurationSpec {
    pub source: PlatformConfigurationSource,
    pub chart: PlatformConfigurationChart,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: Option<serde_json::Value>,
}

// ============================================================================
// ApplicationDefinition
// ============================================================================

/// Application kind surfaced to users.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub kind: String,
    #[serde(default)]
    pub singular: String,
    /// Plural resource name. Defaults to `lower(kind) + "s"`.
    #[serde(default)]
    pub plural: String,
    /// OpenAPI v3 schema of the application values, as JSON text.
    #[serde(default, rename = "openAPISchema")]
    pub open_api_schema: String,
}

/// Cross-namespace chart reference.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChartRef {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// Chart addressed by name inside a source.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseChart {
    pub name: String,
    pub source_ref: ChartRef,
}

/// How releases of this application are produced.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    /// Release name prefix; the application name is the remainder.
    #[serde(default)]
    pub prefix: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_ref: Option<ChartRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ReleaseChart>,

    /// Values merged into every release of this application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: Option<serde_json::Value>,
}

/// One subresource selector.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    /// Templated resource names; `{{ .name }}`, `{{ .kind }}` and `{{ .namespace }}` are available.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
}

/// Include/exclude selectors for one subresource type.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelectors {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<ResourceSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<ResourceSelector>,
}

/// Dashboard presentation metadata.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSpec {
    #[serde(default)]
    pub singular: String,
    #[serde(default)]
    pub plural: String,
    /// Fixed instance name; when set, `metadata.name` is hidden in forms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub singular_resource: bool,
    #[serde(default)]
    pub weight: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tabs: Vec<String>,
    /// Form field order as JSON paths.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys_order: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<bool>,
}

/// Template of a workload monitor rendered per release.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadMonitorTemplate {
    pub name: String,
    pub kind: String,
    pub r#type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<String>,
    /// Empty means always.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// `ApplicationDefinition` describes one user-visible application kind.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "cozystack.io",
    version = "v1alpha1",
    kind = "ApplicationDefinition",
    shortname = "appdef",
    doc = "ApplicationDefinition describes one user-visible application kind: its UI schema, release prefix, chart pointer, subresource selectors and workload monitor templates."
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDefinitionSpec {
    pub application: ApplicationSpec,
    pub release: ReleaseSpec,
    #[serde(default)]
    pub secrets: ResourceSelectors,
    #[serde(default)]
    pub services: ResourceSelectors,
    #[serde(default)]
    pub ingresses: ResourceSelectors,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard: Option<DashboardSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workload_monitors: Vec<WorkloadMonitorTemplate>,
}

impl ApplicationDefinitionSpec {
    /// Plural resource name of the application kind.
    #[must_use]
    pub fn plural(&self) -> String {
        if self.application.plural.is_empty() {
            format!("{}s", self.application.kind.to_lowercase())
        } else {
            self.application.plural.clone()
        }
    }

    /// Whether a release chart (by name and source) belongs to this definition.
    #[must_use]
    pub fn matches_chart(&self, chart_name: &str) -> bool {
        self.release
            .chart
            .as_ref()
            .is_some_and(|chart| chart.name == chart_name)
    }
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
