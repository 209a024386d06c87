// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Bundle` reconciliation: artifacts and releases from a flat package list.
//!
//! A bundle is the coarse-grained counterpart of `PackageSource` + `Package`.
//! Its packages are resolved against dependency targets of other bundles,
//! charts are published through one generator per target namespace, and one
//! release is emitted per enabled package.
//!
//! Emitted objects carry `cozystack.io/bundle=<name>`. With `deletionPolicy:
//! Orphan` they carry no owner reference to the bundle, so deleting the bundle
//! leaves them in place.

use crate::constants::{
    BUNDLE_DEPENDENCY_REQUEUE_SECS, DEFAULT_RELEASE_INTERVAL, INFINITE_RETRIES,
    KIND_ARTIFACT_GENERATOR, KIND_BUNDLE, KIND_EXTERNAL_ARTIFACT, KIND_HELM_RELEASE,
    PUBLIC_NAMESPACE,
};
use crate::context::Context;
use crate::crd::{Bundle, BundlePackage, DeletionPolicy};
use crate::external::{
    ArtifactGenerator, ArtifactGeneratorSpec, CopyOperation, CrossNamespaceSourceReference,
    DependencyReference, HelmRelease, HelmReleaseSpec, OutputArtifact, ReleaseAction, Remediation,
    SourceReference, STRATEGY_MERGE, STRATEGY_OVERWRITE,
};
use crate::labels::{
    APPLICATION_GROUP, APPLICATION_KIND, BUNDLE, SYSTEM_APP, TRUE, UI, VALUES_FILES_ANNOTATION,
};
use crate::naming::{
    first_path_segment, is_system_namespace, last_path_segment, resolve_base_path, source_file,
    source_glob,
};
use crate::reconcilers::resources::{
    create_or_update, delete_if_exists, ensure_namespace, merge_into, owner_reference,
};
use crate::values::merged;
use anyhow::{Context as _, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
    #[error("invalid dependsOn format: {0} (expected bundleName/target)")]
    InvalidDependsOn(String),

    #[error("dependency bundle {0} not found")]
    DependencyBundleNotFound(String),

    #[error("target {target} not found in bundle {bundle}")]
    TargetNotFound { target: String, bundle: String },

    #[error("package {package} references artifact {artifact} which is not defined in bundle artifacts")]
    UnknownArtifact { package: String, artifact: String },
}

/// Splits a `bundleName/target` dependency entry.
///
/// # Errors
///
/// Returns [`BundleError::InvalidDependsOn`] unless the entry has exactly two
/// non-empty parts.
pub fn parse_dependency(entry: &str) -> Result<(&str, &str), BundleError> {
    match entry.split('/').collect::<Vec<_>>().as_slice() {
        [bundle, target] if !bundle.is_empty() && !target.is_empty() => Ok((*bundle, *target)),
        _ => Err(BundleError::InvalidDependsOn(entry.to_string())),
    }
}

/// Enabled packages of `bundle`, with every package of each cross-bundle
/// dependency target appended to their `dependsOn`.
///
/// # Errors
///
/// Returns an error when a dependency entry is malformed, names a missing
/// bundle, or names a missing target.
pub fn resolve_packages(
    bundle: &Bundle,
    bundles: &BTreeMap<String, Bundle>,
) -> Result<Vec<BundlePackage>, BundleError> {
    let mut resolved: Vec<BundlePackage> = bundle
        .spec
        .packages
        .iter()
        .filter(|p| !p.disabled)
        .cloned()
        .collect();

    for entry in &bundle.spec.depends_on {
        let (bundle_name, target_name) = parse_dependency(entry)?;
        let dependency = bundles
            .get(bundle_name)
            .ok_or_else(|| BundleError::DependencyBundleNotFound(bundle_name.to_string()))?;
        let target = dependency
            .spec
            .dependency_targets
            .iter()
            .find(|t| t.name == target_name)
            .ok_or_else(|| BundleError::TargetNotFound {
                target: target_name.to_string(),
                bundle: bundle_name.to_string(),
            })?;

        for package in &mut resolved {
            for name in &target.packages {
                if !package.depends_on.contains(name) {
                    package.depends_on.push(name.clone());
                }
            }
        }
    }
    Ok(resolved)
}

/// Every package pointing at an artifact must point at a declared one.
///
/// # Errors
///
/// Returns the first package referencing an undeclared artifact.
pub fn check_artifacts(bundle: &Bundle, packages: &[BundlePackage]) -> Result<(), BundleError> {
    let declared: BTreeSet<&str> = bundle.spec.artifacts.iter().map(|a| a.name.as_str()).collect();
    for package in packages {
        if let Some(artifact) = package.artifact.as_deref().filter(|a| !a.is_empty()) {
            if !declared.contains(artifact) {
                return Err(BundleError::UnknownArtifact {
                    package: package.name.clone(),
                    artifact: artifact.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Namespace a chart at `path` is published in.
#[must_use]
pub fn publish_namespace(path: &str, hub_namespace: &str) -> String {
    match first_path_segment(path) {
        "apps" | "extra" => PUBLIC_NAMESPACE.to_string(),
        _ => hub_namespace.to_string(),
    }
}

/// Owner reference emitted objects carry, `None` under the orphan policy.
#[must_use]
pub fn bundle_owner(bundle: &Bundle) -> Option<OwnerReference> {
    match bundle.spec.deletion_policy {
        DeletionPolicy::Delete => owner_reference(bundle, true),
        DeletionPolicy::Orphan => None,
    }
}

/// Drops references to the bundle, then adds `desired` when set. References to
/// other owners are preserved.
pub fn reconcile_owner_refs(
    refs: &mut Option<Vec<OwnerReference>>,
    desired: Option<&OwnerReference>,
    bundle_name: &str,
) {
    let mut kept: Vec<OwnerReference> = refs
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|r| !(r.kind == KIND_BUNDLE && r.name == bundle_name))
        .collect();
    if let Some(owner) = desired {
        kept.push(owner.clone());
    }
    *refs = if kept.is_empty() { None } else { Some(kept) };
}

fn bundle_labels(bundle: &Bundle) -> BTreeMap<String, String> {
    let mut labels = bundle.spec.labels.clone();
    labels.insert(BUNDLE.to_string(), bundle.name_any());
    labels
}

fn copy_chart(
    alias: &str,
    base_path: &str,
    path: &str,
    chart_dir: &str,
    libraries: &[String],
    bundle: &Bundle,
) -> Vec<CopyOperation> {
    let mut copy = vec![CopyOperation {
        from: source_glob(alias, base_path, path),
        to: format!("@artifact/{chart_dir}/"),
        ..Default::default()
    }];
    for library_name in libraries {
        if let Some(library) = bundle.spec.libraries.iter().find(|l| l.name == *library_name) {
            copy.push(CopyOperation {
                from: source_glob(alias, base_path, &library.path),
                to: format!("@artifact/{chart_dir}/charts/{library_name}/"),
                ..Default::default()
            });
        }
    }
    copy
}

/// Generators for a bundle, one per namespace charts are published in.
#[must_use]
pub fn build_artifact_generators(
    bundle: &Bundle,
    packages: &[BundlePackage],
    hub_namespace: &str,
) -> Vec<ArtifactGenerator> {
    let name = bundle.name_any();
    let source_ref = &bundle.spec.source_ref;
    let alias = source_ref.name.as_str();
    let base_path = resolve_base_path(bundle.spec.base_path.as_deref(), &source_ref.kind);

    let mut by_namespace: BTreeMap<String, Vec<OutputArtifact>> = BTreeMap::new();

    for package in packages {
        let Some(path) = package.path.as_deref().filter(|p| !p.is_empty()) else {
            continue;
        };
        let chart_dir = last_path_segment(path);
        if chart_dir.is_empty() {
            debug!(bundle = %name, package = %package.name, path = %path, "Skipping package with invalid path");
            continue;
        }
        let mut copy = copy_chart(alias, &base_path, path, chart_dir, &package.libraries, bundle);
        for (i, values_file) in package.values_files.iter().enumerate() {
            let strategy = if i == 0 { STRATEGY_OVERWRITE } else { STRATEGY_MERGE };
            copy.push(CopyOperation {
                from: source_file(alias, &base_path, &format!("{path}/{values_file}")),
                to: format!("@artifact/{chart_dir}/values.yaml"),
                strategy: Some(strategy.to_string()),
                ..Default::default()
            });
        }
        by_namespace
            .entry(publish_namespace(path, hub_namespace))
            .or_default()
            .push(OutputArtifact {
                name: format!("{name}-{chart_dir}"),
                origin_revision: None,
                copy,
            });
    }

    for artifact in &bundle.spec.artifacts {
        let chart_dir = last_path_segment(&artifact.path);
        if chart_dir.is_empty() {
            debug!(bundle = %name, artifact = %artifact.name, "Skipping artifact with invalid path");
            continue;
        }
        let copy = copy_chart(alias, &base_path, &artifact.path, chart_dir, &artifact.libraries, bundle);
        by_namespace
            .entry(publish_namespace(&artifact.path, hub_namespace))
            .or_default()
            .push(OutputArtifact {
                name: format!("{name}-{}", artifact.name),
                origin_revision: None,
                copy,
            });
    }

    let owner = bundle_owner(bundle);
    by_namespace
        .into_iter()
        .map(|(namespace, artifacts)| ArtifactGenerator {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                namespace: Some(namespace),
                labels: Some(bundle_labels(bundle)),
                owner_references: owner.clone().map(|r| vec![r]),
                ..Default::default()
            },
            spec: ArtifactGeneratorSpec {
                sources: vec![SourceReference {
                    alias: source_ref.name.clone(),
                    kind: source_ref.kind.clone(),
                    name: source_ref.name.clone(),
                    namespace: Some(source_ref.namespace.clone()),
                }],
                output_artifacts: artifacts,
            },
            status: None,
        })
        .collect()
}

/// Artifact (name, namespace) a package's release points at.
#[must_use]
pub fn package_artifact(bundle: &Bundle, package: &BundlePackage, hub_namespace: &str) -> Option<(String, String)> {
    let name = bundle.name_any();
    if let Some(artifact) = package.artifact.as_deref().filter(|a| !a.is_empty()) {
        let declared = bundle.spec.artifacts.iter().find(|a| a.name == artifact)?;
        return Some((
            format!("{name}-{artifact}"),
            publish_namespace(&declared.path, hub_namespace),
        ));
    }
    let path = package.path.as_deref().filter(|p| !p.is_empty())?;
    let chart_dir = last_path_segment(path);
    if chart_dir.is_empty() {
        return None;
    }
    Some((format!("{name}-{chart_dir}"), publish_namespace(path, hub_namespace)))
}

/// Package name → package across all bundles (first bundle by name wins),
/// with the current bundle's resolved packages taking precedence.
#[must_use]
pub fn global_packages(
    bundles: &BTreeMap<String, Bundle>,
    current: &[BundlePackage],
) -> BTreeMap<String, BundlePackage> {
    let mut map = BTreeMap::new();
    for bundle in bundles.values() {
        for package in &bundle.spec.packages {
            map.entry(package.name.clone()).or_insert_with(|| package.clone());
        }
    }
    for package in current {
        map.insert(package.name.clone(), package.clone());
    }
    map
}

/// Labels of a package's release: bundle labels, package labels, then the bundle label.
#[must_use]
pub fn release_labels(bundle: &Bundle, package: &BundlePackage) -> BTreeMap<String, String> {
    let mut labels = bundle.spec.labels.clone();
    labels.extend(package.labels.clone());
    labels.insert(BUNDLE.to_string(), bundle.name_any());
    if is_system_namespace(&package.namespace) {
        labels.insert(SYSTEM_APP.to_string(), TRUE.to_string());
    }
    labels
}

/// Release emitted for one package, or `None` when it has no chart.
#[must_use]
pub fn build_release(
    bundle: &Bundle,
    package: &BundlePackage,
    global: &BTreeMap<String, BundlePackage>,
    hub_namespace: &str,
) -> Option<HelmRelease> {
    let (artifact, artifact_namespace) = package_artifact(bundle, package, hub_namespace)?;

    let depends_on = package
        .depends_on
        .iter()
        .map(|dependency| match global.get(dependency) {
            Some(found) => DependencyReference {
                name: found.name.clone(),
                namespace: Some(found.namespace.clone()),
            },
            None => DependencyReference {
                name: dependency.clone(),
                namespace: Some(package.namespace.clone()),
            },
        })
        .collect();

    let annotations = (!package.values_files.is_empty()).then(|| {
        BTreeMap::from([(
            VALUES_FILES_ANNOTATION.to_string(),
            package.values_files.join(","),
        )])
    });

    let retry_forever = || {
        Some(ReleaseAction {
            remediation: Some(Remediation {
                retries: Some(INFINITE_RETRIES),
            }),
        })
    };

    Some(HelmRelease {
        metadata: ObjectMeta {
            name: Some(package.name.clone()),
            namespace: Some(package.namespace.clone()),
            labels: Some(release_labels(bundle, package)),
            annotations,
            owner_references: bundle_owner(bundle).map(|r| vec![r]),
            ..Default::default()
        },
        spec: HelmReleaseSpec {
            chart_ref: Some(CrossNamespaceSourceReference {
                kind: KIND_EXTERNAL_ARTIFACT.to_string(),
                name: artifact,
                namespace: Some(artifact_namespace),
            }),
            interval: DEFAULT_RELEASE_INTERVAL.to_string(),
            release_name: Some(package.release_name.clone()).filter(|n| !n.is_empty()),
            install: retry_forever(),
            upgrade: retry_forever(),
            depends_on,
            values: package.values.clone(),
            ..Default::default()
        },
        status: None,
    })
}

/// Whether a live release is driven by users through the application API or the UI.
#[must_use]
pub fn is_user_managed(release: &HelmRelease) -> bool {
    let labels = release.labels();
    let application = labels.get(APPLICATION_KIND).is_some_and(|v| !v.is_empty())
        && labels.get(APPLICATION_GROUP).is_some_and(|v| !v.is_empty());
    application || labels.get(UI).is_some_and(|v| v == TRUE)
}

/// Applies `desired` onto a live release.
///
/// User-managed releases keep their values, with bundle values merged on top.
/// Everything else gets the bundle's spec verbatim.
pub fn update_release(live: &mut HelmRelease, desired: &HelmRelease, bundle_name: &str) {
    let values = if is_user_managed(live) {
        merged(live.spec.values.as_ref(), desired.spec.values.as_ref())
    } else {
        desired.spec.values.clone()
    };
    live.spec = desired.spec.clone();
    live.spec.values = values;
    merge_into(&mut live.metadata.labels, desired.labels());
    merge_into(&mut live.metadata.annotations, desired.annotations());
    reconcile_owner_refs(
        &mut live.metadata.owner_references,
        desired.owner_references().first(),
        bundle_name,
    );
}

/// Namespace → (privileged, extra labels) for the resolved packages.
#[must_use]
pub fn namespace_plan(packages: &[BundlePackage]) -> BTreeMap<String, (bool, BTreeMap<String, String>)> {
    let mut plan: BTreeMap<String, (bool, BTreeMap<String, String>)> = BTreeMap::new();
    for package in packages.iter().filter(|p| !p.namespace.is_empty()) {
        let entry = plan.entry(package.namespace.clone()).or_default();
        entry.0 |= package.privileged;
        entry.1.extend(package.namespace_labels.clone());
    }
    plan
}

async fn apply_generators(ctx: &Context, bundle: &Bundle, generators: Vec<ArtifactGenerator>) -> Result<()> {
    let name = bundle.name_any();
    let mut desired = BTreeSet::new();
    for generator in generators {
        let namespace = generator.namespace().unwrap_or_default();
        let api: Api<ArtifactGenerator> = Api::namespaced(ctx.client.clone(), &namespace);
        let spec = generator.spec.clone();
        let labels = generator.labels().clone();
        let owner = generator.owner_references().first().cloned();
        create_or_update(&api, generator, |ag| {
            ag.spec = spec.clone();
            merge_into(&mut ag.metadata.labels, &labels);
            reconcile_owner_refs(&mut ag.metadata.owner_references, owner.as_ref(), &name);
            Ok(())
        })
        .await
        .with_context(|| format!("failed to reconcile {KIND_ARTIFACT_GENERATOR} {namespace}/{name}"))?;
        desired.insert(namespace);
    }

    let all: Api<ArtifactGenerator> = Api::all(ctx.client.clone());
    let existing = all
        .list(&ListParams::default().labels(&format!("{BUNDLE}={name}")))
        .await?;
    for generator in existing {
        let namespace = generator.namespace().unwrap_or_default();
        if generator.name_any() == name && desired.contains(&namespace) {
            continue;
        }
        let api: Api<ArtifactGenerator> = Api::namespaced(ctx.client.clone(), &namespace);
        if let Err(e) = delete_if_exists(&api, &generator.name_any(), KIND_ARTIFACT_GENERATOR).await {
            error!(name = %generator.name_any(), namespace = %namespace, error = %e, "Failed to delete orphaned ArtifactGenerator");
        }
    }
    Ok(())
}

async fn apply_releases(
    ctx: &Context,
    bundle: &Bundle,
    packages: &[BundlePackage],
    global: &BTreeMap<String, BundlePackage>,
) -> Result<()> {
    let name = bundle.name_any();
    let hub = &ctx.config.hub_namespace;
    let mut desired = BTreeSet::new();

    for package in packages {
        let Some(release) = build_release(bundle, package, global, hub) else {
            warn!(bundle = %name, package = %package.name, "Skipping package with neither artifact nor path");
            continue;
        };
        let api: Api<HelmRelease> = Api::namespaced(ctx.client.clone(), &package.namespace);
        let template = release.clone();
        create_or_update(&api, template, |hr| {
            update_release(hr, &release, &name);
            Ok(())
        })
        .await
        .with_context(|| format!("failed to reconcile {KIND_HELM_RELEASE} {}", package.name))?;
        desired.insert((package.name.clone(), package.namespace.clone()));
    }

    let all: Api<HelmRelease> = Api::all(ctx.client.clone());
    let existing = all
        .list(&ListParams::default().labels(&format!("{BUNDLE}={name}")))
        .await?;
    for release in existing {
        let key = (release.name_any(), release.namespace().unwrap_or_default());
        if desired.contains(&key) {
            continue;
        }
        info!(bundle = %name, name = %key.0, namespace = %key.1, "Deleting orphaned release");
        let api: Api<HelmRelease> = Api::namespaced(ctx.client.clone(), &key.1);
        if let Err(e) = delete_if_exists(&api, &key.0, KIND_HELM_RELEASE).await {
            error!(name = %key.0, namespace = %key.1, error = %e, "Failed to delete orphaned release");
        }
    }
    Ok(())
}

/// Reconciles a `Bundle`.
///
/// # Errors
///
/// Returns an error on malformed dependencies, undeclared artifacts or API
/// failures. A missing dependency bundle requeues instead.
pub async fn reconcile_bundle(ctx: Arc<Context>, bundle: Arc<Bundle>) -> Result<Action> {
    let name = bundle.name_any();
    let api: Api<Bundle> = Api::all(ctx.client.clone());
    let bundles: BTreeMap<String, Bundle> = api
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .map(|b| (b.name_any(), b))
        .collect();

    let packages = match resolve_packages(&bundle, &bundles) {
        Ok(packages) => packages,
        Err(BundleError::DependencyBundleNotFound(missing)) => {
            info!(bundle = %name, dependency = %missing, "Dependency bundle not found, requeuing");
            return Ok(Action::requeue(Duration::from_secs(BUNDLE_DEPENDENCY_REQUEUE_SECS)));
        }
        Err(e) => return Err(e.into()),
    };

    for (namespace, (privileged, labels)) in namespace_plan(&packages) {
        ensure_namespace(&ctx.client, &namespace, privileged, &labels, &ctx.config.tenant_prefix)
            .await
            .with_context(|| format!("failed to reconcile namespace {namespace}"))?;
    }

    check_artifacts(&bundle, &packages)?;

    let generators = build_artifact_generators(&bundle, &packages, &ctx.config.hub_namespace);
    if generators.is_empty() {
        info!(bundle = %name, "No output artifacts to generate");
    }
    apply_generators(&ctx, &bundle, generators).await?;

    let global = global_packages(&bundles, &packages);
    apply_releases(&ctx, &bundle, &packages, &global).await?;

    info!(bundle = %name, packages = packages.len(), "Reconciled Bundle");
    Ok(Action::await_change())
}

/// Maps a release event to the bundle that emitted it.
#[must_use]
pub fn release_bundle(release: &HelmRelease) -> Option<String> {
    release.labels().get(BUNDLE).cloned()
}

#[cfg(test)]
#[path = "bundle_tests.rs"]
mod bundle_tests;
