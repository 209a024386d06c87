// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition reasons for operator resources.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a condition
//! has a particular status. Every top-level object carries exactly one condition of
//! type `Ready`; job-shaped objects additionally carry a `phase`.
//!
//! # Example Status
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: DependenciesNotReady
//!       message: "Variant dependencies not ready: dependent Package db not found"
//! ```

// ============================================================================
// Condition Types and Statuses
// ============================================================================

/// The single encompassing condition type maintained by every reconciler
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Condition type set by the API server on established CRDs
pub const CONDITION_TYPE_ESTABLISHED: &str = "Established";

/// Condition status `True`
pub const CONDITION_TRUE: &str = "True";

/// Condition status `False`
pub const CONDITION_FALSE: &str = "False";

/// Condition status `Unknown`
pub const CONDITION_UNKNOWN: &str = "Unknown";

// ============================================================================
// PackageSource Reasons
// ============================================================================

/// The `PackageSource` has no source reference.
pub const REASON_SOURCE_REF_NOT_SET: &str = "SourceRefNotSet";

/// The generator has not been created (yet).
pub const REASON_ARTIFACT_GENERATOR_NOT_FOUND: &str = "ArtifactGeneratorNotFound";

/// The generator exists but reports no `Ready` condition.
pub const REASON_ARTIFACT_GENERATOR_NOT_READY: &str = "ArtifactGeneratorNotReady";

/// The `PackageSource` has no components with a path, so nothing was generated.
pub const REASON_NO_ARTIFACTS: &str = "NoArtifacts";

// ============================================================================
// Package Reasons
// ============================================================================

/// Releases were emitted successfully.
pub const REASON_RECONCILIATION_SUCCEEDED: &str = "ReconciliationSucceeded";

/// A cross-package dependency is missing; nothing new is emitted.
pub const REASON_DEPENDENCIES_NOT_READY: &str = "DependenciesNotReady";

/// The same-named `PackageSource` does not exist.
pub const REASON_PACKAGE_SOURCE_NOT_FOUND: &str = "PackageSourceNotFound";

/// The selected variant does not exist in the `PackageSource`.
pub const REASON_VARIANT_NOT_FOUND: &str = "VariantNotFound";

/// Building the `dependsOn` list of a release failed.
pub const REASON_DEPENDS_ON_FAILED: &str = "DependsOnFailed";

/// Writing a release failed.
pub const REASON_HELM_RELEASE_FAILED: &str = "HelmReleaseFailed";

/// Reconciling namespaces failed.
pub const REASON_NAMESPACE_FAILED: &str = "NamespaceFailed";

// ============================================================================
// Backup Reasons
// ============================================================================

/// The referenced `BackupClass` does not exist.
pub const REASON_BACKUP_CLASS_NOT_FOUND: &str = "BackupClassNotFound";

/// The `BackupClass` has no strategy for the application's group and kind.
pub const REASON_NO_MATCHING_STRATEGY: &str = "NoMatchingStrategy";

/// The backup driver reported a terminal failure.
pub const REASON_BACKUP_FAILED: &str = "BackupFailed";

/// The backup completed and a `Backup` object was recorded.
pub const REASON_BACKUP_SUCCEEDED: &str = "BackupSucceeded";

/// The restore driver reported a terminal failure.
pub const REASON_RESTORE_FAILED: &str = "RestoreFailed";

/// The restore completed.
pub const REASON_RESTORE_SUCCEEDED: &str = "RestoreSucceeded";

/// The plan schedule could not be parsed.
pub const REASON_INVALID_SCHEDULE: &str = "InvalidSchedule";

/// The plan is scheduling jobs.
pub const REASON_SCHEDULED: &str = "Scheduled";
