// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Package` reconciliation: namespaces and releases for one variant.
//!
//! A `Package` selects a variant of its same-named `PackageSource`. Each pass:
//!
//! 1. Creates or updates the namespaces enabled components install into
//! 2. Gates on the variant's cross-package dependencies (missing ones hold the
//!    package in `DependenciesNotReady` and leave existing releases alone)
//! 3. Emits one release per enabled component, with `dependsOn` built from
//!    intra-variant and cross-package dependencies
//! 4. Deletes releases labeled with this package that are no longer desired
//! 5. Touches dependent packages so they re-evaluate their gate

use crate::constants::{
    DEFAULT_RELEASE_INTERVAL, DEFAULT_VARIANT, INFINITE_RETRIES, KIND_EXTERNAL_ARTIFACT,
    KIND_HELM_RELEASE,
};
use crate::context::Context;
use crate::crd::{Component, Package, PackageSource, PackageStatus, Variant};
use crate::external::{
    CrossNamespaceSourceReference, DependencyReference, HelmRelease, HelmReleaseSpec,
    ReleaseAction, Remediation,
};
use crate::labels::{PACKAGE, PRIVILEGED, TRIGGER_RECONCILE_ANNOTATION, TRUE};
use crate::naming::artifact_name;
use crate::reconcilers::resources::{
    create_or_update, delete_if_exists, ensure_namespace, merge_into, owner_reference,
};
use crate::reconcilers::status::{conditions_equal, patch_status, set_condition};
use crate::status_reasons::{
    CONDITION_FALSE, CONDITION_TRUE, CONDITION_TYPE_READY, REASON_DEPENDENCIES_NOT_READY,
    REASON_DEPENDS_ON_FAILED, REASON_HELM_RELEASE_FAILED, REASON_NAMESPACE_FAILED,
    REASON_PACKAGE_SOURCE_NOT_FOUND, REASON_RECONCILIATION_SUCCEEDED, REASON_VARIANT_NOT_FOUND,
};
use crate::values::carry_namespace_values;
use anyhow::{Context as _, Result};
use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Api, ResourceExt};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a variant's cross-package dependencies cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    #[error("dependent Package {0} not found")]
    PackageNotFound(String),

    #[error("dependent PackageSource {0} not found")]
    PackageSourceNotFound(String),

    #[error("dependent variant {variant} not found in PackageSource {package_source}")]
    VariantNotFound {
        variant: String,
        package_source: String,
    },

    #[error("component {dependency} not found in variant for dependency of {component}")]
    ComponentNotFound { component: String, dependency: String },
}

/// Snapshot of every `Package` and `PackageSource`, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct PackageIndex {
    pub packages: BTreeMap<String, Package>,
    pub sources: BTreeMap<String, PackageSource>,
}

impl PackageIndex {
    #[must_use]
    pub fn new(packages: Vec<Package>, sources: Vec<PackageSource>) -> Self {
        Self {
            packages: packages.into_iter().map(|p| (p.name_any(), p)).collect(),
            sources: sources.into_iter().map(|s| (s.name_any(), s)).collect(),
        }
    }

    /// The variant a package selects, resolved against its source.
    ///
    /// # Errors
    ///
    /// Returns which lookup failed.
    pub fn selected_variant(&self, package_name: &str) -> Result<(&Package, &Variant), DependencyError> {
        let package = self
            .packages
            .get(package_name)
            .ok_or_else(|| DependencyError::PackageNotFound(package_name.to_string()))?;
        let source = self
            .sources
            .get(package_name)
            .ok_or_else(|| DependencyError::PackageSourceNotFound(package_name.to_string()))?;
        let variant_name = variant_name(package);
        let variant = find_variant(source, variant_name).ok_or_else(|| {
            DependencyError::VariantNotFound {
                variant: variant_name.to_string(),
                package_source: package_name.to_string(),
            }
        })?;
        Ok((package, variant))
    }

    /// Packages whose selected variant depends (without ignoring it) on `name`.
    #[must_use]
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.packages
            .values()
            .filter(|p| p.name_any() != name)
            .filter(|p| {
                self.sources
                    .get(&p.name_any())
                    .and_then(|s| find_variant(s, variant_name(p)))
                    .is_some_and(|v| active_dependencies(p, v).contains(&name))
            })
            .map(ResourceExt::name_any)
            .collect()
    }
}

/// Selected variant name, `default` when unset.
#[must_use]
pub fn variant_name(package: &Package) -> &str {
    package
        .spec
        .variant
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_VARIANT)
}

#[must_use]
pub fn find_variant<'a>(source: &'a PackageSource, name: &str) -> Option<&'a Variant> {
    source.spec.variants.iter().find(|v| v.name == name)
}

/// Whether a component is installed by a package.
///
/// Components need an install section. A package override's `enabled` wins;
/// otherwise `install.disabled` decides.
#[must_use]
pub fn is_enabled(package: &Package, component: &Component) -> bool {
    let Some(install) = &component.install else {
        return false;
    };
    match package
        .spec
        .components
        .get(&component.name)
        .and_then(|o| o.enabled)
    {
        Some(enabled) => enabled,
        None => !install.disabled,
    }
}

/// Release name and namespace a component installs as.
#[must_use]
pub fn release_target(component: &Component, hub_namespace: &str) -> DependencyReference {
    let install = component.install.as_ref();
    DependencyReference {
        name: install
            .and_then(|i| i.release_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| component.name.clone()),
        namespace: Some(
            install
                .and_then(|i| i.namespace.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| hub_namespace.to_string()),
        ),
    }
}

/// Cross-package dependencies of a variant that the package does not ignore.
#[must_use]
pub fn active_dependencies<'a>(package: &Package, variant: &'a Variant) -> Vec<&'a str> {
    variant
        .depends_on
        .iter()
        .filter(|d| !package.spec.ignore_dependencies.contains(d))
        .map(String::as_str)
        .collect()
}

/// Namespace → privileged for every enabled component.
///
/// # Errors
///
/// Returns an error when an enabled component has no namespace.
pub fn namespace_requirements(package: &Package, variant: &Variant) -> Result<BTreeMap<String, bool>> {
    let mut namespaces = BTreeMap::new();
    for component in variant.components.iter().filter(|c| is_enabled(package, c)) {
        let Some(install) = &component.install else {
            continue;
        };
        let namespace = install.namespace.as_deref().unwrap_or_default();
        if namespace.is_empty() {
            anyhow::bail!(
                "component {} has empty namespace in install section",
                component.name
            );
        }
        let privileged = namespaces.entry(namespace.to_string()).or_insert(false);
        *privileged |= install.privileged;
    }
    Ok(namespaces)
}

/// Checks that every active cross-package dependency resolves.
///
/// # Errors
///
/// Returns the first dependency that does not resolve.
pub fn validate_dependencies(
    package: &Package,
    variant: &Variant,
    index: &PackageIndex,
) -> Result<(), DependencyError> {
    for dependency in active_dependencies(package, variant) {
        index.selected_variant(dependency)?;
    }
    Ok(())
}

fn push_unique(list: &mut Vec<DependencyReference>, item: DependencyReference) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// `dependsOn` of one component: intra-variant dependencies, then every
/// enabled component of every active cross-package dependency.
///
/// # Errors
///
/// Returns an error when a referenced component or package does not resolve.
pub fn build_depends_on(
    package: &Package,
    variant: &Variant,
    component: &Component,
    index: &PackageIndex,
    hub_namespace: &str,
) -> Result<Vec<DependencyReference>, DependencyError> {
    let mut depends_on = Vec::new();

    let install_deps = component
        .install
        .as_ref()
        .map(|i| i.depends_on.as_slice())
        .unwrap_or_default();
    for dependency in install_deps {
        let target = variant
            .components
            .iter()
            .find(|c| c.name == *dependency && c.install.is_some())
            .ok_or_else(|| DependencyError::ComponentNotFound {
                component: component.name.clone(),
                dependency: dependency.clone(),
            })?;
        push_unique(&mut depends_on, release_target(target, hub_namespace));
    }

    for dependency in active_dependencies(package, variant) {
        let (dep_package, dep_variant) = index.selected_variant(dependency)?;
        for dep_component in dep_variant
            .components
            .iter()
            .filter(|c| is_enabled(dep_package, c))
        {
            push_unique(&mut depends_on, release_target(dep_component, hub_namespace));
        }
    }

    Ok(depends_on)
}

/// Release emitted for one component.
#[must_use]
pub fn build_release(
    package: &Package,
    variant: &Variant,
    component: &Component,
    depends_on: Vec<DependencyReference>,
    hub_namespace: &str,
) -> HelmRelease {
    let target = release_target(component, hub_namespace);
    let package_name = package.name_any();

    let mut labels = BTreeMap::from([(PACKAGE.to_string(), package_name.clone())]);
    if component.install.as_ref().is_some_and(|i| i.privileged) {
        labels.insert(PRIVILEGED.to_string(), TRUE.to_string());
    }

    let retry_forever = || {
        Some(ReleaseAction {
            remediation: Some(Remediation {
                retries: Some(INFINITE_RETRIES),
            }),
        })
    };

    HelmRelease {
        metadata: ObjectMeta {
            name: Some(target.name),
            namespace: target.namespace,
            labels: Some(labels),
            owner_references: owner_reference(package, true).map(|r| vec![r]),
            ..Default::default()
        },
        spec: HelmReleaseSpec {
            chart_ref: Some(CrossNamespaceSourceReference {
                kind: KIND_EXTERNAL_ARTIFACT.to_string(),
                name: artifact_name(&package_name, &variant.name, &component.name),
                namespace: Some(hub_namespace.to_string()),
            }),
            interval: DEFAULT_RELEASE_INTERVAL.to_string(),
            install: retry_forever(),
            upgrade: retry_forever(),
            depends_on,
            values: package
                .spec
                .components
                .get(&component.name)
                .and_then(|o| o.values.clone()),
            ..Default::default()
        },
        status: None,
    }
}

/// Every release a package should own, in component order.
///
/// # Errors
///
/// Returns an error when a component's dependencies do not resolve.
pub fn desired_releases(
    package: &Package,
    variant: &Variant,
    index: &PackageIndex,
    hub_namespace: &str,
) -> Result<Vec<HelmRelease>, (String, DependencyError)> {
    variant
        .components
        .iter()
        .filter(|c| is_enabled(package, c))
        .map(|component| {
            let depends_on = build_depends_on(package, variant, component, index, hub_namespace)
                .map_err(|e| (component.name.clone(), e))?;
            Ok(build_release(package, variant, component, depends_on, hub_namespace))
        })
        .collect()
}

async fn set_ready(
    ctx: &Context,
    package: &Package,
    status: &str,
    reason: &str,
    message: &str,
) -> Result<()> {
    let current = package.status.clone().unwrap_or_default();
    let mut conditions = current.conditions.clone();
    set_condition(
        &mut conditions,
        CONDITION_TYPE_READY,
        status,
        reason,
        message,
        package.metadata.generation,
    );
    if conditions_equal(&current.conditions, &conditions) {
        return Ok(());
    }
    let api: Api<Package> = Api::all(ctx.client.clone());
    patch_status(&api, &package.name_any(), &PackageStatus { conditions }).await
}

async fn apply_release(ctx: &Context, desired: HelmRelease) -> Result<()> {
    let namespace = desired.namespace().unwrap_or_default();
    let api: Api<HelmRelease> = Api::namespaced(ctx.client.clone(), &namespace);
    let spec = desired.spec.clone();
    let labels = desired.metadata.labels.clone().unwrap_or_default();
    let owners = desired.metadata.owner_references.clone();
    create_or_update(&api, desired, |hr| {
        let values = carry_namespace_values(hr.spec.values.as_ref(), spec.values.clone());
        hr.spec = spec.clone();
        hr.spec.values = values;
        merge_into(&mut hr.metadata.labels, &labels);
        hr.metadata.owner_references = owners.clone();
        Ok(())
    })
    .await?;
    Ok(())
}

async fn delete_orphans(ctx: &Context, package: &str, desired: &BTreeSet<(String, String)>) -> Result<()> {
    let api: Api<HelmRelease> = Api::all(ctx.client.clone());
    let releases = api
        .list(&ListParams::default().labels(&format!("{PACKAGE}={package}")))
        .await
        .context("failed to list releases")?;
    for release in releases {
        let key = (release.name_any(), release.namespace().unwrap_or_default());
        if desired.contains(&key) {
            continue;
        }
        info!(name = %key.0, namespace = %key.1, package = %package, "Deleting orphaned release");
        let ns_api: Api<HelmRelease> = Api::namespaced(ctx.client.clone(), &key.1);
        if let Err(e) = delete_if_exists(&ns_api, &key.0, KIND_HELM_RELEASE).await {
            error!(name = %key.0, namespace = %key.1, error = %e, "Failed to delete orphaned release");
        }
    }
    Ok(())
}

async fn trigger_dependents(ctx: &Context, index: &PackageIndex, package: &str) {
    let api: Api<Package> = Api::all(ctx.client.clone());
    let now = Utc::now().timestamp().to_string();
    for dependent in index.dependents_of(package) {
        debug!(package = %dependent, dependency = %package, "Triggering dependent package");
        let patch = json!({
            "metadata": { "annotations": { TRIGGER_RECONCILE_ANNOTATION: now } }
        });
        if let Err(e) = api
            .patch(&dependent, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            warn!(package = %dependent, error = %e, "Failed to trigger dependent package");
        }
    }
}

/// Reconciles a `Package`.
///
/// # Errors
///
/// Returns an error on API failures; dependency and lookup problems are
/// reported on the status instead.
pub async fn reconcile_package(ctx: Arc<Context>, package: Arc<Package>) -> Result<Action> {
    let name = package.name_any();
    let hub = ctx.config.hub_namespace.clone();

    let packages: Api<Package> = Api::all(ctx.client.clone());
    let sources: Api<PackageSource> = Api::all(ctx.client.clone());
    let index = PackageIndex::new(
        packages.list(&ListParams::default()).await?.items,
        sources.list(&ListParams::default()).await?.items,
    );

    let Some(source) = index.sources.get(&name) else {
        set_ready(
            &ctx,
            &package,
            CONDITION_FALSE,
            REASON_PACKAGE_SOURCE_NOT_FOUND,
            &format!("PackageSource {name} not found"),
        )
        .await?;
        return Ok(Action::await_change());
    };
    let Some(variant) = find_variant(source, variant_name(&package)) else {
        set_ready(
            &ctx,
            &package,
            CONDITION_FALSE,
            REASON_VARIANT_NOT_FOUND,
            &format!(
                "Variant {} not found in PackageSource {name}",
                variant_name(&package)
            ),
        )
        .await?;
        return Ok(Action::await_change());
    };

    let namespaces = namespace_requirements(&package, variant)?;
    for (namespace, privileged) in &namespaces {
        if let Err(e) = ensure_namespace(
            &ctx.client,
            namespace,
            *privileged,
            &BTreeMap::new(),
            &ctx.config.tenant_prefix,
        )
        .await
        {
            set_ready(
                &ctx,
                &package,
                CONDITION_FALSE,
                REASON_NAMESPACE_FAILED,
                &format!("Failed to reconcile namespace {namespace}: {e:#}"),
            )
            .await?;
            return Err(e.context(format!("failed to reconcile namespace {namespace}")));
        }
    }

    if let Err(e) = validate_dependencies(&package, variant, &index) {
        info!(package = %name, reason = %e, "Variant dependencies not ready");
        set_ready(
            &ctx,
            &package,
            CONDITION_FALSE,
            REASON_DEPENDENCIES_NOT_READY,
            &format!("Variant dependencies not ready: {e}"),
        )
        .await?;
        return Ok(Action::await_change());
    }

    let releases = match desired_releases(&package, variant, &index, &hub) {
        Ok(releases) => releases,
        Err((component, e)) => {
            set_ready(
                &ctx,
                &package,
                CONDITION_FALSE,
                REASON_DEPENDS_ON_FAILED,
                &format!("Failed to build DependsOn for component {component}: {e}"),
            )
            .await?;
            return Ok(Action::await_change());
        }
    };

    let mut desired = BTreeSet::new();
    for release in releases {
        let key = (release.name_any(), release.namespace().unwrap_or_default());
        if let Err(e) = apply_release(&ctx, release).await {
            set_ready(
                &ctx,
                &package,
                CONDITION_FALSE,
                REASON_HELM_RELEASE_FAILED,
                &format!("Failed to create HelmRelease {}: {e:#}", key.0),
            )
            .await?;
            return Err(e);
        }
        debug!(package = %name, release = %key.0, namespace = %key.1, "Reconciled release");
        desired.insert(key);
    }

    if let Err(e) = delete_orphans(&ctx, &name, &desired).await {
        error!(package = %name, error = %e, "Failed to clean up orphaned releases");
    }

    set_ready(
        &ctx,
        &package,
        CONDITION_TRUE,
        REASON_RECONCILIATION_SUCCEEDED,
        &format!(
            "reconciliation succeeded, generated {} helmrelease(s)",
            desired.len()
        ),
    )
    .await?;
    info!(package = %name, releases = desired.len(), "Reconciled Package");

    trigger_dependents(&ctx, &index, &name).await;
    Ok(Action::await_change())
}

/// Packages to re-reconcile when `changed` (a package) changes.
#[must_use]
pub fn dependents_to_enqueue(index: &PackageIndex, changed: &str) -> Vec<ObjectRef<Package>> {
    index
        .dependents_of(changed)
        .iter()
        .map(|name| ObjectRef::new(name))
        .collect()
}

#[cfg(test)]
#[path = "package_tests.rs"]
mod package_tests;
