// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all controllers.
//!
//! Every controller receives an `Arc<Context>` holding:
//! - the Kubernetes client
//! - the operator configuration
//! - reflector stores for cross-controller lookups
//! - the chart → application registry used for lineage
//!
//! The stores answer "which definition owns this release" from memory, so
//! watch mappers never hit the API server.

use crate::config::OperatorConfig;
use crate::crd::{ApplicationDefinition, Package, PackageSource};
use crate::external::HelmRelease;
use crate::lineage::ApplicationRegistry;
use kube::runtime::reflector::Store;
use kube::{Client, ResourceExt};
use std::sync::Arc;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Parsed command-line and environment configuration
    pub config: Arc<OperatorConfig>,

    /// Reflector stores
    pub stores: Stores,

    /// Chart → application mapping, refreshed on definition changes
    pub registry: Arc<ApplicationRegistry>,
}

/// Reflector stores shared between controllers.
#[derive(Clone)]
pub struct Stores {
    pub application_definitions: Store<ApplicationDefinition>,
    pub packages: Store<Package>,
    pub package_sources: Store<PackageSource>,
}

/// Whether a release was produced from a definition: same chart, and the
/// release name carries the definition's prefix.
#[must_use]
pub fn definition_matches_release(definition: &ApplicationDefinition, release: &HelmRelease) -> bool {
    let spec = &definition.spec.release;
    if !release.name_any().starts_with(&spec.prefix) {
        return false;
    }
    if let Some(chart) = &release.spec.chart {
        return spec
            .chart
            .as_ref()
            .is_some_and(|c| c.name == chart.spec.chart);
    }
    if let Some(chart_ref) = &release.spec.chart_ref {
        return spec
            .chart_ref
            .as_ref()
            .is_some_and(|c| c.kind == chart_ref.kind && c.name == chart_ref.name);
    }
    false
}

impl Stores {
    /// The definition a release belongs to.
    ///
    /// Definitions are checked in name order and the longest matching prefix
    /// wins, so `pg-` beats an empty prefix on the same chart.
    #[must_use]
    pub fn definition_for_release(&self, release: &HelmRelease) -> Option<Arc<ApplicationDefinition>> {
        let mut definitions = self.application_definitions.state();
        definitions.sort_by_key(|d| d.name_any());
        definitions
            .into_iter()
            .filter(|d| definition_matches_release(d, release))
            .max_by_key(|d| d.spec.release.prefix.len())
    }

    /// All known definitions, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<Arc<ApplicationDefinition>> {
        let mut definitions = self.application_definitions.state();
        definitions.sort_by_key(|d| d.name_any());
        definitions
    }

    /// Get a `PackageSource` by name from the store.
    #[must_use]
    pub fn get_package_source(&self, name: &str) -> Option<Arc<PackageSource>> {
        self.package_sources
            .state()
            .into_iter()
            .find(|p| p.name_any() == name)
    }

    /// Get a `Package` by name from the store.
    #[must_use]
    pub fn get_package(&self, name: &str) -> Option<Arc<Package>> {
        self.packages
            .state()
            .into_iter()
            .find(|p| p.name_any() == name)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
