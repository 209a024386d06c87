// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `PackageSource` reconciliation: one `ArtifactGenerator` per source.
//!
//! Every (variant, component) pair with a chart path becomes one output
//! artifact. The copy operations assemble the chart directory: the component
//! tree, its libraries under `charts/`, then its values files overlaid onto
//! `values.yaml` (first overwrite, the rest merge).

use crate::constants::KIND_ARTIFACT_GENERATOR;
use crate::context::Context;
use crate::crd::{Condition, Library, PackageSource, PackageSourceStatus};
use crate::external::{
    ArtifactGenerator, ArtifactGeneratorSpec, CopyOperation, OutputArtifact, SourceReference,
    STRATEGY_MERGE, STRATEGY_OVERWRITE,
};
use crate::labels::PACKAGE_SOURCE;
use crate::naming::{artifact_name, last_path_segment, resolve_base_path, source_file, source_glob};
use crate::reconcilers::resources::{create_or_update, merge_into, owner_reference};
use crate::reconcilers::status::{conditions_equal, patch_status, ready_condition, set_condition};
use crate::status_reasons::{
    CONDITION_TYPE_READY, CONDITION_UNKNOWN, REASON_ARTIFACT_GENERATOR_NOT_FOUND,
    REASON_ARTIFACT_GENERATOR_NOT_READY, REASON_NO_ARTIFACTS, REASON_SOURCE_REF_NOT_SET,
};
use anyhow::{Context as _, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Library name → library, across every variant of the source.
///
/// Unnamed libraries are keyed by the last segment of their path.
#[must_use]
pub fn library_map(source: &PackageSource) -> BTreeMap<String, Library> {
    let mut map = BTreeMap::new();
    for variant in &source.spec.variants {
        for library in &variant.libraries {
            let name = library
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| last_path_segment(&library.path).to_string());
            if !name.is_empty() {
                map.insert(name, library.clone());
            }
        }
    }
    map
}

/// Output artifacts for every component of every variant.
#[must_use]
pub fn build_output_artifacts(source: &PackageSource) -> Vec<OutputArtifact> {
    let Some(source_ref) = &source.spec.source_ref else {
        return Vec::new();
    };
    let alias = &source_ref.name;
    let base_path = resolve_base_path(source_ref.path.as_deref(), &source_ref.kind);
    let libraries = library_map(source);
    let name = source.name_any();

    let mut artifacts = Vec::new();
    for variant in &source.spec.variants {
        for component in &variant.components {
            let chart_dir = last_path_segment(&component.path);
            if component.path.is_empty() || chart_dir.is_empty() {
                debug!(
                    package_source = %name,
                    variant = %variant.name,
                    component = %component.name,
                    "Skipping component without path"
                );
                continue;
            }

            let mut copy = vec![CopyOperation {
                from: source_glob(alias, &base_path, &component.path),
                to: format!("@artifact/{chart_dir}/"),
                ..Default::default()
            }];

            for library_name in &component.libraries {
                if let Some(library) = libraries.get(library_name) {
                    copy.push(CopyOperation {
                        from: source_glob(alias, &base_path, &library.path),
                        to: format!("@artifact/{chart_dir}/charts/{library_name}/"),
                        ..Default::default()
                    });
                }
            }

            for (i, values_file) in component.values_files.iter().enumerate() {
                let strategy = if i == 0 { STRATEGY_OVERWRITE } else { STRATEGY_MERGE };
                copy.push(CopyOperation {
                    from: source_file(
                        alias,
                        &base_path,
                        &format!("{}/{}", component.path, values_file),
                    ),
                    to: format!("@artifact/{chart_dir}/values.yaml"),
                    strategy: Some(strategy.to_string()),
                    ..Default::default()
                });
            }

            artifacts.push(OutputArtifact {
                name: artifact_name(&name, &variant.name, &component.name),
                origin_revision: None,
                copy,
            });
        }
    }
    artifacts
}

/// The generator a `PackageSource` should own, or `None` when there is nothing to build.
#[must_use]
pub fn build_artifact_generator(source: &PackageSource, hub_namespace: &str) -> Option<ArtifactGenerator> {
    let source_ref = source.spec.source_ref.as_ref()?;
    let artifacts = build_output_artifacts(source);
    if artifacts.is_empty() {
        return None;
    }
    Some(ArtifactGenerator {
        metadata: ObjectMeta {
            name: Some(source.name_any()),
            namespace: Some(hub_namespace.to_string()),
            labels: Some(BTreeMap::from([(
                PACKAGE_SOURCE.to_string(),
                source.name_any(),
            )])),
            owner_references: owner_reference(source, true).map(|r| vec![r]),
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
}

/// Ready condition mirrored from the generator.
fn mirrored_ready(
    source: &PackageSource,
    generator: Option<&ArtifactGenerator>,
    has_artifacts: bool,
    conditions: &mut Vec<Condition>,
) {
    let generation = source.metadata.generation;
    if source.spec.source_ref.is_none() {
        set_condition(
            conditions,
            CONDITION_TYPE_READY,
            CONDITION_UNKNOWN,
            REASON_SOURCE_REF_NOT_SET,
            "SourceRef is not configured",
            generation,
        );
        return;
    }
    if !has_artifacts {
        set_condition(
            conditions,
            CONDITION_TYPE_READY,
            CONDITION_UNKNOWN,
            REASON_NO_ARTIFACTS,
            "no components with a chart path",
            generation,
        );
        return;
    }
    let Some(generator) = generator else {
        set_condition(
            conditions,
            CONDITION_TYPE_READY,
            CONDITION_UNKNOWN,
            REASON_ARTIFACT_GENERATOR_NOT_FOUND,
            "ArtifactGenerator not found",
            generation,
        );
        return;
    };
    match generator
        .status
        .as_ref()
        .and_then(|s| ready_condition(&s.conditions))
    {
        Some(ready) => set_condition(
            conditions,
            CONDITION_TYPE_READY,
            &ready.status,
            ready.reason.as_deref().unwrap_or_default(),
            ready.message.as_deref().unwrap_or_default(),
            generation,
        ),
        None => set_condition(
            conditions,
            CONDITION_TYPE_READY,
            CONDITION_UNKNOWN,
            REASON_ARTIFACT_GENERATOR_NOT_READY,
            "ArtifactGenerator Ready condition not found",
            generation,
        ),
    }
}

/// Status a `PackageSource` should carry given its generator.
#[must_use]
pub fn compute_status(
    source: &PackageSource,
    generator: Option<&ArtifactGenerator>,
    has_artifacts: bool,
) -> PackageSourceStatus {
    let current = source.status.clone().unwrap_or_default();
    let mut conditions = current.conditions.clone();
    mirrored_ready(source, generator, has_artifacts, &mut conditions);
    let variants: Vec<&str> = source
        .spec
        .variants
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    PackageSourceStatus {
        variants: Some(variants.join(",")),
        conditions,
    }
}

/// Reconciles a `PackageSource`.
///
/// # Errors
///
/// Returns an error if the generator cannot be written or the status patch fails.
pub async fn reconcile_packagesource(ctx: Arc<Context>, source: Arc<PackageSource>) -> Result<Action> {
    let name = source.name_any();
    let hub = ctx.config.hub_namespace.clone();
    let generators: Api<ArtifactGenerator> = Api::namespaced(ctx.client.clone(), &hub);

    let desired = build_artifact_generator(&source, &hub);
    if let Some(desired) = &desired {
        let spec = desired.spec.clone();
        let labels = desired.metadata.labels.clone().unwrap_or_default();
        let owners = desired.metadata.owner_references.clone();
        create_or_update(&generators, desired.clone(), |ag| {
            ag.spec = spec.clone();
            merge_into(&mut ag.metadata.labels, &labels);
            ag.metadata.owner_references = owners.clone();
            Ok(())
        })
        .await
        .with_context(|| format!("failed to reconcile {KIND_ARTIFACT_GENERATOR} {name}"))?;
        info!(
            package_source = %name,
            artifacts = desired.spec.output_artifacts.len(),
            "Reconciled ArtifactGenerator"
        );
    } else {
        info!(package_source = %name, "No ArtifactGenerator to generate");
    }

    let generator = if source.spec.source_ref.is_some() {
        generators.get_opt(&name).await?
    } else {
        None
    };
    let status = compute_status(&source, generator.as_ref(), desired.is_some());
    let current = source.status.clone().unwrap_or_default();
    if current.variants != status.variants || !conditions_equal(&current.conditions, &status.conditions) {
        let api: Api<PackageSource> = Api::all(ctx.client.clone());
        patch_status(&api, &name, &status).await?;
    }

    Ok(Action::await_change())
}

/// Maps a generator event to its owning `PackageSource`.
#[must_use]
pub fn generator_owner(generator: &ArtifactGenerator) -> Option<String> {
    generator
        .owner_references()
        .iter()
        .find(|r| r.kind == crate::constants::KIND_PACKAGE_SOURCE)
        .map(|r| r.name.clone())
}

#[cfg(test)]
#[path = "packagesource_tests.rs"]
mod packagesource_tests;
