// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Cozystack operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the platform CRDs (packages, bundles, platforms, definitions)
pub const API_GROUP: &str = "cozystack.io";

/// API version for all operator-owned CRDs
pub const API_VERSION: &str = "v1alpha1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "cozystack.io/v1alpha1";

/// API group for the backup CRDs
pub const BACKUPS_API_GROUP: &str = "backups.cozystack.io";

/// API group for backup strategy objects referenced by `BackupClass`
pub const STRATEGY_API_GROUP: &str = "strategy.backups.cozystack.io";

/// API group of the user-visible application kinds
pub const APPLICATION_API_GROUP: &str = "apps.cozystack.io";

/// API version of the user-visible application kinds
pub const APPLICATION_API_VERSION: &str = "v1alpha1";

/// Kind name for `PackageSource` resource
pub const KIND_PACKAGE_SOURCE: &str = "PackageSource";

/// Kind name for `Package` resource
pub const KIND_PACKAGE: &str = "Package";

/// Kind name for `Bundle` resource
pub const KIND_BUNDLE: &str = "Bundle";

/// Kind name for `Platform` resource
pub const KIND_PLATFORM: &str = "Platform";

/// Kind name for `PlatformConfiguration` resource
pub const KIND_PLATFORM_CONFIGURATION: &str = "PlatformConfiguration";

/// Kind name for `ApplicationDefinition` resource
pub const KIND_APPLICATION_DEFINITION: &str = "ApplicationDefinition";

/// Kind name for `BackupJob` resource
pub const KIND_BACKUP_JOB: &str = "BackupJob";

/// Kind name for `RestoreJob` resource
pub const KIND_RESTORE_JOB: &str = "RestoreJob";

/// Kind name for `Plan` resource
pub const KIND_PLAN: &str = "Plan";

/// Kind name for `Backup` resource
pub const KIND_BACKUP: &str = "Backup";

/// Kind name for the external `HelmRelease` resource
pub const KIND_HELM_RELEASE: &str = "HelmRelease";

/// Kind name for the external `ArtifactGenerator` resource
pub const KIND_ARTIFACT_GENERATOR: &str = "ArtifactGenerator";

/// Kind used in release chart references that point at generated artifacts
pub const KIND_EXTERNAL_ARTIFACT: &str = "ExternalArtifact";

/// Source kind for git-backed sources
pub const KIND_GIT_REPOSITORY: &str = "GitRepository";

/// Source kind for OCI-backed sources
pub const KIND_OCI_REPOSITORY: &str = "OCIRepository";

/// Strategy kind handled by the Velero backup driver
pub const KIND_VELERO_STRATEGY: &str = "Velero";

// ============================================================================
// Namespace Constants
// ============================================================================

/// Hub namespace hosting generated artifacts, the platform release and replicated secrets
pub const HUB_NAMESPACE: &str = "cozy-system";

/// Namespace hosting user-facing application artifacts
pub const PUBLIC_NAMESPACE: &str = "cozy-public";

/// Prefix identifying tenant namespaces
pub const TENANT_PREFIX: &str = "tenant-";

/// Root tenant namespace
pub const TENANT_ROOT: &str = "tenant-root";

// ============================================================================
// Package / Release Constants
// ============================================================================

/// Variant selected when a `Package` does not name one
pub const DEFAULT_VARIANT: &str = "default";

/// Default base path inside git sources
pub const DEFAULT_GIT_BASE_PATH: &str = "packages";

/// Default platform chart path inside git sources
pub const DEFAULT_PLATFORM_GIT_BASE_PATH: &str = "packages/core/platform";

/// Default platform chart path inside OCI sources
pub const DEFAULT_PLATFORM_OCI_BASE_PATH: &str = "core/platform";

/// Name of the root platform release
pub const PLATFORM_RELEASE_NAME: &str = "cozystack-platform";

/// Reconcile interval written into generated releases
pub const DEFAULT_RELEASE_INTERVAL: &str = "5m";

/// Remediation retries sentinel meaning "retry forever"
pub const INFINITE_RETRIES: i64 = -1;

/// Secret referenced by every UI release through `valuesFrom`
pub const VALUES_SECRET_NAME: &str = "cozystack-values";

/// Reserved values key holding propagated namespace labels
pub const NAMESPACE_VALUES_KEY: &str = "_namespace";

/// Reserved values key holding platform-injected values
pub const COZYSTACK_VALUES_KEY: &str = "_cozystack";

// ============================================================================
// Controller Error Handling Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue after an optimistic-concurrency conflict (500 milliseconds)
pub const CONFLICT_REQUEUE_DURATION_MILLIS: u64 = 500;

/// Requeue while a dependency bundle does not exist yet (10 seconds)
pub const BUNDLE_DEPENDENCY_REQUEUE_SECS: u64 = 10;

/// Requeue while a backup driver resource is still running (5 seconds)
pub const DRIVER_POLL_REQUEUE_SECS: u64 = 5;

/// Periodic resync for derived state (5 minutes)
pub const RESYNC_REQUEUE_DURATION_SECS: u64 = 300;

// ============================================================================
// Config Hash Constants
// ============================================================================

/// Default debounce window for config-hash rollouts (5 seconds)
pub const DEFAULT_CONFIG_HASH_DEBOUNCE_SECS: u64 = 5;

/// Default workload that consumes resource definitions
pub const DEFAULT_CONFIG_HASH_WORKLOAD: &str = "cozystack-api";

// ============================================================================
// Helm Storage Constants
// ============================================================================

/// Type of the secrets Helm stores release history in
pub const HELM_RELEASE_SECRET_TYPE: &str = "helm.sh/release.v1";

/// Value of the `owner` label on Helm storage secrets
pub const HELM_STORAGE_OWNER: &str = "helm";

/// Release failure that a stale history secret leaves behind
pub const NO_DEPLOYED_RELEASES_MESSAGE: &str = "has no deployed releases";

// ============================================================================
// CRD Install Constants
// ============================================================================

/// Field manager used when applying CRDs
pub const CRD_FIELD_MANAGER: &str = "cozystack-operator";

/// Poll interval while waiting for CRDs to become established
pub const CRD_ESTABLISHED_POLL_MILLIS: u64 = 500;

/// Upper bound on waiting for CRDs to become established
pub const CRD_ESTABLISHED_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Field Managers
// ============================================================================

/// Field manager for lineage label server-side apply
pub const LINEAGE_FIELD_MANAGER: &str = "cozystack/lineage";

/// Field manager for all other operator writes
pub const OPERATOR_FIELD_MANAGER: &str = "cozystack-operator";

/// Maximum length of a Kubernetes label value
pub const MAX_LABEL_VALUE_LEN: usize = 63;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease name
pub const DEFAULT_LEASE_NAME: &str = "cozystack-operator-leader";

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election grace period (5 seconds)
pub const DEFAULT_LEASE_GRACE_SECS: u64 = 5;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// HTTP Server Constants
// ============================================================================

/// Port for the metrics, health and admission HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

/// Path of the `BackupJob` validating admission endpoint
pub const BACKUPJOB_WEBHOOK_PATH: &str = "/validate-backupjob";
