// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration.
//!
//! Every flag has an environment fallback so the operator can be configured
//! from a Deployment manifest without arguments.

use crate::constants::{
    DEFAULT_CONFIG_HASH_DEBOUNCE_SECS, DEFAULT_CONFIG_HASH_WORKLOAD, DEFAULT_LEASE_NAME,
    HUB_NAMESPACE, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PORT, TENANT_PREFIX,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Default lineage watch list.
pub const DEFAULT_LINEAGE_WATCH: &str = "v1/Pod,v1/Service,v1/PersistentVolumeClaim,v1/Secret";

/// Reconciliation loops that can be enabled individually.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum ControllerName {
    /// Every controller below.
    All,
    PackageSource,
    Package,
    Bundle,
    Platform,
    PlatformConfiguration,
    ApplicationDefinition,
    Dashboard,
    SubresourceRbac,
    WorkloadMonitor,
    NamespaceLabels,
    Lineage,
    SecretReplicator,
    ConfigHash,
    FluxPlunger,
    BackupJob,
    RestoreJob,
    Plan,
}

/// Workload kind whose pod template carries the config hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
}

#[derive(Clone, Debug, Parser)]
#[command(
    name = "cozystack-operator",
    version,
    about = "Platform orchestration operator for multi-tenant Kubernetes"
)]
pub struct OperatorConfig {
    /// Controllers to run (comma-separated).
    #[arg(
        long,
        env = "COZYSTACK_CONTROLLERS",
        value_enum,
        value_delimiter = ',',
        default_value = "all"
    )]
    pub controllers: Vec<ControllerName>,

    /// Namespace hosting generated artifacts, platform releases and the values secret.
    #[arg(long, env = "COZYSTACK_HUB_NAMESPACE", default_value = HUB_NAMESPACE)]
    pub hub_namespace: String,

    /// Prefix identifying tenant namespaces.
    #[arg(long, env = "COZYSTACK_TENANT_PREFIX", default_value = TENANT_PREFIX)]
    pub tenant_prefix: String,

    /// Bind address of the metrics, probe and webhook server.
    #[arg(long, env = "COZYSTACK_BIND_ADDRESS", default_value = METRICS_SERVER_BIND_ADDRESS)]
    pub bind_address: String,

    /// Port of the metrics, probe and webhook server.
    #[arg(long, env = "COZYSTACK_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub port: u16,

    /// Run controllers only while holding the leader lease.
    #[arg(
        long,
        env = "COZYSTACK_LEADER_ELECTION",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub leader_election: bool,

    /// Name of the leader election Lease.
    #[arg(long, env = "COZYSTACK_LEASE_NAME", default_value = DEFAULT_LEASE_NAME)]
    pub lease_name: String,

    /// Namespace of the leader election Lease (defaults to the hub namespace).
    #[arg(long, env = "POD_NAMESPACE")]
    pub lease_namespace: Option<String>,

    /// Identity used for the lease holder (defaults to the hostname).
    #[arg(long, env = "POD_NAME")]
    pub identity: Option<String>,

    /// Install the operator's CRDs on startup.
    #[arg(long, env = "COZYSTACK_INSTALL_CRDS", default_value_t = false)]
    pub install_crds: bool,

    /// Multi-document CRD manifest to install instead of the built-in CRDs.
    #[arg(long, env = "COZYSTACK_CRD_MANIFEST")]
    pub crd_manifest: Option<PathBuf>,

    /// Seconds to wait after the last definition change before rolling the API workload.
    #[arg(
        long,
        env = "COZYSTACK_CONFIG_HASH_DEBOUNCE",
        default_value_t = DEFAULT_CONFIG_HASH_DEBOUNCE_SECS
    )]
    pub config_hash_debounce_secs: u64,

    /// Kind of the workload annotated with the definitions hash.
    #[arg(
        long,
        env = "COZYSTACK_CONFIG_HASH_KIND",
        value_enum,
        default_value = "deployment"
    )]
    pub config_hash_kind: WorkloadKind,

    /// Name of the workload annotated with the definitions hash.
    #[arg(long, env = "COZYSTACK_CONFIG_HASH_NAME", default_value = DEFAULT_CONFIG_HASH_WORKLOAD)]
    pub config_hash_name: String,

    /// Namespace of the workload annotated with the definitions hash (defaults to the hub namespace).
    #[arg(long, env = "COZYSTACK_CONFIG_HASH_NAMESPACE")]
    pub config_hash_namespace: Option<String>,

    /// Kinds stamped with lineage labels, as `group/version/Kind` or `v1/Kind` entries.
    #[arg(long, env = "COZYSTACK_LINEAGE_WATCH", default_value = DEFAULT_LINEAGE_WATCH)]
    pub lineage_watch: String,
}

impl OperatorConfig {
    /// Whether a controller should run.
    #[must_use]
    pub fn is_enabled(&self, controller: ControllerName) -> bool {
        self.controllers
            .iter()
            .any(|c| *c == ControllerName::All || *c == controller)
    }

    #[must_use]
    pub fn lease_namespace(&self) -> &str {
        self.lease_namespace.as_deref().unwrap_or(&self.hub_namespace)
    }

    #[must_use]
    pub fn config_hash_namespace(&self) -> &str {
        self.config_hash_namespace
            .as_deref()
            .unwrap_or(&self.hub_namespace)
    }

    #[must_use]
    pub fn config_hash_debounce(&self) -> Duration {
        Duration::from_secs(self.config_hash_debounce_secs)
    }

    /// Lease holder identity: `--identity`, else `$HOSTNAME`, else a fixed fallback.
    #[must_use]
    pub fn identity(&self) -> String {
        self.identity
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "cozystack-operator".to_string())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
