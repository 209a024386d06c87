// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Application lineage: which managed application an arbitrary object belongs to.
//!
//! Objects are walked upward through their owner references (and the release
//! labels Helm stamps on everything it installs) until a `HelmRelease` is
//! reached. The release is then translated into an application identity, either
//! from its own application labels or through the [`ApplicationRegistry`] built
//! from `ApplicationDefinition`s.

use crate::constants::{APPLICATION_API_GROUP, KIND_HELM_RELEASE, MAX_LABEL_VALUE_LEN};
use crate::crd::ApplicationDefinition;
use crate::external::HelmRelease;
use crate::labels::{
    APPLICATION_GROUP, APPLICATION_KIND, APPLICATION_NAME, HELM_RELEASE_NAME,
    HELM_RELEASE_NAMESPACE,
};
use crate::naming::truncate_label_value;
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind};
use kube::discovery::{pinned_kind, Scope};
use kube::{Client, Resource, ResourceExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Owner-reference hops followed before giving up.
pub const MAX_WALK_DEPTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineageError {
    #[error("watch resource list is empty")]
    EmptyWatchList,

    #[error("invalid resource token '{0}', expected 'group/version/Kind' or 'v1/Kind'")]
    InvalidWatchToken(String),
}

/// Parses a comma-separated `group/version/Kind` (or `version/Kind`) list.
///
/// # Errors
///
/// Returns [`LineageError`] on an empty list or malformed entries.
pub fn parse_watch_list(csv: &str) -> Result<Vec<GroupVersionKind>, LineageError> {
    let csv = csv.trim();
    if csv.is_empty() {
        return Err(LineageError::EmptyWatchList);
    }
    csv.split(',')
        .map(str::trim)
        .map(|token| {
            let parts: Vec<&str> = token.split('/').collect();
            match parts.as_slice() {
                [version, kind] if !version.is_empty() && !kind.is_empty() => {
                    Ok(GroupVersionKind::gvk("", version, kind))
                }
                [group, version, kind] if !version.is_empty() && !kind.is_empty() => {
                    Ok(GroupVersionKind::gvk(group, version, kind))
                }
                _ => Err(LineageError::InvalidWatchToken(token.to_string())),
            }
        })
        .collect()
}

/// Identity of the application an object belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ApplicationIdentity {
    pub group: String,
    pub kind: String,
    pub name: String,
}

impl ApplicationIdentity {
    /// The three lineage labels, with values truncated to the label length limit.
    #[must_use]
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                APPLICATION_GROUP.to_string(),
                truncate_label_value(&self.group, MAX_LABEL_VALUE_LEN),
            ),
            (
                APPLICATION_KIND.to_string(),
                truncate_label_value(&self.kind, MAX_LABEL_VALUE_LEN),
            ),
            (
                APPLICATION_NAME.to_string(),
                truncate_label_value(&self.name, MAX_LABEL_VALUE_LEN),
            ),
        ])
    }
}

/// Whether all three lineage labels are already present.
#[must_use]
pub fn has_lineage_labels(labels: &BTreeMap<String, String>) -> bool {
    [APPLICATION_GROUP, APPLICATION_KIND, APPLICATION_NAME]
        .iter()
        .all(|key| labels.contains_key(*key))
}

// ============================================================================
// Chart → application registry
// ============================================================================

/// How a release addresses its chart.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChartKey {
    /// Chart by name inside a named source repository.
    Repo { repo: String, chart: String },
    /// Chart by reference to a built artifact.
    Artifact { kind: String, name: String },
}

impl ChartKey {
    /// Keys a definition's releases may use.
    #[must_use]
    pub fn of_definition(definition: &ApplicationDefinition) -> Vec<ChartKey> {
        let release = &definition.spec.release;
        let mut keys = Vec::new();
        if let Some(chart) = &release.chart {
            keys.push(ChartKey::Repo {
                repo: chart.source_ref.name.clone(),
                chart: chart.name.clone(),
            });
        }
        if let Some(chart_ref) = &release.chart_ref {
            keys.push(ChartKey::Artifact {
                kind: chart_ref.kind.clone(),
                name: chart_ref.name.clone(),
            });
        }
        keys
    }

    /// Key of the chart a release installs.
    #[must_use]
    pub fn of_release(release: &HelmRelease) -> Option<ChartKey> {
        if let Some(chart) = &release.spec.chart {
            return Some(ChartKey::Repo {
                repo: chart.spec.source_ref.name.clone(),
                chart: chart.spec.chart.clone(),
            });
        }
        release.spec.chart_ref.as_ref().map(|r| ChartKey::Artifact {
            kind: r.kind.clone(),
            name: r.name.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct ApplicationKind {
    kind: String,
    prefix: String,
}

/// In-memory map from chart keys to application kinds, refreshed whenever
/// `ApplicationDefinition`s change.
#[derive(Debug, Default)]
pub struct ApplicationRegistry {
    kinds: RwLock<HashMap<ChartKey, ApplicationKind>>,
}

impl ApplicationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the registry contents. On duplicate chart keys the first
    /// definition by name wins.
    pub async fn replace(&self, definitions: &[ApplicationDefinition]) {
        let mut sorted: Vec<&ApplicationDefinition> = definitions.iter().collect();
        sorted.sort_by_key(|d| d.name_any());

        let mut kinds = HashMap::new();
        for definition in sorted {
            for key in ChartKey::of_definition(definition) {
                kinds.entry(key).or_insert_with(|| ApplicationKind {
                    kind: definition.spec.application.kind.clone(),
                    prefix: definition.spec.release.prefix.clone(),
                });
            }
        }
        *self.kinds.write().await = kinds;
    }

    pub async fn is_empty(&self) -> bool {
        self.kinds.read().await.is_empty()
    }

    /// Application identity of a release.
    ///
    /// Release application labels take precedence over the chart lookup.
    pub async fn resolve(&self, release: &HelmRelease) -> Option<ApplicationIdentity> {
        let labels = release.labels();
        if let (Some(group), Some(kind), Some(name)) = (
            labels.get(APPLICATION_GROUP),
            labels.get(APPLICATION_KIND),
            labels.get(APPLICATION_NAME),
        ) {
            return Some(ApplicationIdentity {
                group: group.clone(),
                kind: kind.clone(),
                name: name.clone(),
            });
        }

        let key = ChartKey::of_release(release)?;
        let kinds = self.kinds.read().await;
        let app = kinds.get(&key)?;
        let release_name = release.name_any();
        let name = release_name
            .strip_prefix(app.prefix.as_str())
            .unwrap_or(&release_name)
            .to_string();
        Some(ApplicationIdentity {
            group: APPLICATION_API_GROUP.to_string(),
            kind: app.kind.clone(),
            name,
        })
    }
}

// ============================================================================
// Owner graph
// ============================================================================

/// Read access to the objects on an owner chain.
#[async_trait]
pub trait ObjectGraph: Send + Sync {
    /// Fetches an object by API version and kind; `None` if it does not exist.
    async fn get_object(
        &self,
        namespace: &str,
        api_version: &str,
        kind: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>>;

    /// Fetches a release; `None` if it does not exist.
    async fn get_release(&self, namespace: &str, name: &str) -> Result<Option<HelmRelease>>;
}

/// [`ObjectGraph`] backed by the cluster, with API discovery results cached per kind.
pub struct ClusterObjectGraph {
    client: Client,
    resources: RwLock<HashMap<(String, String), (ApiResource, bool)>>,
}

impl ClusterObjectGraph {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resources: RwLock::new(HashMap::new()),
        }
    }

    async fn resolve(&self, api_version: &str, kind: &str) -> Result<(ApiResource, bool)> {
        let key = (api_version.to_string(), kind.to_string());
        if let Some(found) = self.resources.read().await.get(&key) {
            return Ok(found.clone());
        }

        let (group, version) = api_version.split_once('/').unwrap_or(("", api_version));
        let gvk = GroupVersionKind::gvk(group, version, kind);
        let (resource, capabilities) = pinned_kind(&self.client, &gvk)
            .await
            .with_context(|| format!("failed to discover {api_version}/{kind}"))?;
        let namespaced = capabilities.scope == Scope::Namespaced;

        self.resources
            .write()
            .await
            .insert(key, (resource.clone(), namespaced));
        Ok((resource, namespaced))
    }

    /// Dynamic API for a kind, scoped to `namespace` when the kind is namespaced.
    ///
    /// # Errors
    ///
    /// Returns an error when the kind cannot be discovered.
    pub async fn api_for(
        &self,
        namespace: &str,
        api_version: &str,
        kind: &str,
    ) -> Result<Api<DynamicObject>> {
        let (resource, namespaced) = self.resolve(api_version, kind).await?;
        Ok(if namespaced {
            Api::namespaced_with(self.client.clone(), namespace, &resource)
        } else {
            Api::all_with(self.client.clone(), &resource)
        })
    }
}

#[async_trait]
impl ObjectGraph for ClusterObjectGraph {
    async fn get_object(
        &self,
        namespace: &str,
        api_version: &str,
        kind: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>> {
        let api = self.api_for(namespace, api_version, kind).await?;
        api.get_opt(name)
            .await
            .with_context(|| format!("failed to get {kind} {namespace}/{name}"))
    }

    async fn get_release(&self, namespace: &str, name: &str) -> Result<Option<HelmRelease>> {
        let api: Api<HelmRelease> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .with_context(|| format!("failed to get HelmRelease {namespace}/{name}"))
    }
}

fn is_release_owner(api_version: &str, kind: &str) -> bool {
    let group = api_version.split_once('/').map_or("", |(g, _)| g);
    kind == KIND_HELM_RELEASE && group == HelmRelease::group(&())
}

/// Walks `object`'s ancestry and returns every application it belongs to,
/// nearest first.
///
/// # Errors
///
/// Returns an error when an ancestor cannot be read.
pub async fn find_applications(
    graph: &dyn ObjectGraph,
    registry: &ApplicationRegistry,
    object: &DynamicObject,
) -> Result<Vec<ApplicationIdentity>> {
    let namespace = object.namespace().unwrap_or_default();
    let mut found: Vec<ApplicationIdentity> = Vec::new();
    let mut visited: HashSet<(String, String, String)> = HashSet::new();
    let mut releases: Vec<(String, String)> = Vec::new();
    let mut frontier = vec![object.clone()];

    for _ in 0..MAX_WALK_DEPTH {
        if frontier.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for current in frontier {
            let labels = current.labels();
            if let (Some(name), Some(ns)) = (
                labels.get(HELM_RELEASE_NAME),
                labels.get(HELM_RELEASE_NAMESPACE),
            ) {
                releases.push((ns.clone(), name.clone()));
            }

            for owner in current.owner_references() {
                let key = (
                    owner.api_version.clone(),
                    owner.kind.clone(),
                    owner.name.clone(),
                );
                if !visited.insert(key) {
                    continue;
                }
                if is_release_owner(&owner.api_version, &owner.kind) {
                    releases.push((namespace.clone(), owner.name.clone()));
                    continue;
                }
                match graph
                    .get_object(&namespace, &owner.api_version, &owner.kind, &owner.name)
                    .await?
                {
                    Some(parent) => next.push(parent),
                    None => debug!(
                        kind = %owner.kind,
                        name = %owner.name,
                        namespace = %namespace,
                        "Owner not found, skipping"
                    ),
                }
            }
        }
        frontier = next;
    }

    let mut seen_releases = HashSet::new();
    for (ns, name) in releases {
        if !seen_releases.insert((ns.clone(), name.clone())) {
            continue;
        }
        let Some(release) = graph.get_release(&ns, &name).await? else {
            continue;
        };
        if let Some(identity) = registry.resolve(&release).await {
            if !found.contains(&identity) {
                found.push(identity);
            }
        }
    }
    Ok(found)
}

#[cfg(test)]
#[path = "lineage_tests.rs"]
mod lineage_tests;
