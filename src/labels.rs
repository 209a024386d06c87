// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across all reconcilers.
//!
//! These keys form the contract between the operator, the release engine, the
//! dashboard and the extended API server. Every reconciler that reads or writes
//! one of them goes through this module.

// ============================================================================
// Application Identity (lineage)
// ============================================================================

/// API group of the application that owns an object
pub const APPLICATION_GROUP: &str = "apps.cozystack.io/application.group";

/// Kind of the application that owns an object
pub const APPLICATION_KIND: &str = "apps.cozystack.io/application.kind";

/// Name of the application that owns an object
pub const APPLICATION_NAME: &str = "apps.cozystack.io/application.name";

// ============================================================================
// Release Ownership Labels
// ============================================================================

/// Marks releases managed by the user-visible plane
pub const UI: &str = "cozystack.io/ui";

/// Links a release to the `Package` that emitted it
pub const PACKAGE: &str = "cozystack.io/package";

/// Links a generator to the `PackageSource` that emitted it
pub const PACKAGE_SOURCE: &str = "cozystack.io/packagesource";

/// Links a release or generator to the `Bundle` that emitted it
pub const BUNDLE: &str = "cozystack.io/bundle";

/// Links a release or generator to the `Platform` that emitted it
pub const PLATFORM: &str = "cozystack.io/platform";

/// Release is installed into a privileged namespace
pub const PRIVILEGED: &str = "cozystack.io/privileged";

/// Release lives in a system namespace
pub const SYSTEM_APP: &str = "cozystack.io/system-app";

/// Namespace is a platform system namespace
pub const SYSTEM_NAMESPACE: &str = "cozystack.io/system";

/// Replica mark written by the secret replicator
pub const REPLICATED_FROM: &str = "cozystack.io/replicated-from";

/// Release name label stamped by the release engine on rendered objects
pub const HELM_RELEASE_NAME: &str = "helm.toolkit.fluxcd.io/name";

/// Release namespace label stamped by the release engine on rendered objects
pub const HELM_RELEASE_NAMESPACE: &str = "helm.toolkit.fluxcd.io/namespace";

// ============================================================================
// Derived Object Ownership Labels
// ============================================================================

/// Workload monitors created from resource-definition templates
pub const WORKLOAD_MONITOR_OWNED: &str = "workloadmonitor.cozystack.io/owned-by-crd";

/// Release that produced a workload monitor
pub const WORKLOAD_MONITOR_RELEASE: &str = "workloadmonitor.cozystack.io/helm-release";

/// Dashboard RBAC objects created from resource-definition selectors
pub const DASHBOARD_RESOURCES_OWNED: &str = "dashboardresources.cozystack.io/owned-by-crd";

/// Release that produced dashboard RBAC objects
pub const DASHBOARD_RESOURCES_RELEASE: &str = "dashboardresources.cozystack.io/helm-release";

// ============================================================================
// Namespace Labels
// ============================================================================

/// Pod security enforcement level
pub const POD_SECURITY_ENFORCE: &str = "pod-security.kubernetes.io/enforce";

/// Value of [`POD_SECURITY_ENFORCE`] for privileged namespaces
pub const POD_SECURITY_PRIVILEGED: &str = "privileged";

/// Namespace labels with this prefix are propagated into release values
pub const NAMESPACE_VALUES_PREFIX: &str = "namespace.cozystack.io/";

// ============================================================================
// Annotations
// ============================================================================

/// Prevents release uninstallation from deleting a namespace
pub const HELM_RESOURCE_POLICY: &str = "helm.sh/resource-policy";

/// Value of [`HELM_RESOURCE_POLICY`] that keeps the object
pub const HELM_RESOURCE_POLICY_KEEP: &str = "keep";

/// Rollout trigger on the extended API server pod template
pub const CONFIG_HASH_ANNOTATION: &str = "cozystack.io/config-hash";

/// Bumped on dependent packages to force reconciliation (value is a unix timestamp)
pub const TRIGGER_RECONCILE_ANNOTATION: &str = "cozystack.io/trigger-reconcile";

/// Comma-joined values files of a bundle package
pub const VALUES_FILES_ANNOTATION: &str = "cozypkg.cozystack.io/values-files";

/// Helm history version whose release secret was last removed from a stuck release
pub const LAST_PROCESSED_VERSION_ANNOTATION: &str = "flux-plunger.cozystack.io/last-processed-version";

/// Common value for boolean labels
pub const TRUE: &str = "true";
