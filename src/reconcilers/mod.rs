// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation loops of the platform operator.
//!
//! Every loop is an `async fn(Arc<Context>, Arc<K>) -> anyhow::Result<Action>`
//! wrapped by [`crate::controller::instrument`] in `main.rs`. Loops compare the
//! desired state with what is in the cluster and write only on a difference.
//!
//! # Available Reconcilers
//!
//! ## Packages
//!
//! - [`reconcile_packagesource`] - Emits the `ArtifactGenerator` of a `PackageSource`
//! - [`reconcile_package`] - Emits namespaces and `HelmRelease`s of a `Package`
//! - [`reconcile_bundle`] - Emits generators and releases of a flat `Bundle`
//! - [`reconcile_platform`] - Emits the platform generator and release
//! - [`reconcile_platform_configuration`] - Emits the platform `GitRepository` and release
//!
//! ## Applications
//!
//! - [`reconcile_application_definition`] - Aligns user releases with their definition
//! - [`reconcile_dashboard`] - Publishes dashboard forms and navigation
//! - [`reconcile_subresource_rbac`] - Grants tenants read access to release subresources
//! - [`reconcile_workload_monitors`] - Renders `WorkloadMonitor`s of a release
//! - [`reconcile_namespace_labels`] - Mirrors namespace labels into release values
//! - [`reconcile_lineage`] - Stamps objects with the application they belong to
//! - [`reconcile_secret_replicas`] - Copies the platform values secret to tenants
//! - [`reconcile_config_hash`] - Rolls the API server when definitions change
//! - [`reconcile_flux_plunger`] - Clears stale Helm history that blocks a release
//!
//! ## Backups
//!
//! - [`reconcile_backup_job`], [`reconcile_restore_job`], [`reconcile_plan`]

pub mod appdef_release;
pub mod backup;
pub mod bundle;
pub mod config_hash;
pub mod dashboard;
pub mod flux_plunger;
pub mod lineage_labeler;
pub mod namespace_labels;
pub mod package;
pub mod packagesource;
pub mod platform;
pub mod platform_configuration;
pub mod resources;
pub mod retry;
pub mod secret_replicator;
pub mod status;
pub mod subresource_rbac;
pub mod workload_monitor;

pub use appdef_release::reconcile_application_definition;
pub use backup::{reconcile_backup_job, reconcile_plan, reconcile_restore_job};
pub use bundle::reconcile_bundle;
pub use config_hash::reconcile_config_hash;
pub use dashboard::reconcile_dashboard;
pub use flux_plunger::reconcile_flux_plunger;
pub use lineage_labeler::reconcile_lineage;
pub use namespace_labels::reconcile_namespace_labels;
pub use package::reconcile_package;
pub use packagesource::reconcile_packagesource;
pub use platform::reconcile_platform;
pub use platform_configuration::reconcile_platform_configuration;
pub use secret_replicator::reconcile_secret_replicas;
pub use subresource_rbac::reconcile_subresource_rbac;
pub use workload_monitor::reconcile_workload_monitors;
