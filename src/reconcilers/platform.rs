// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `Platform` reconciliation: the root platform chart.
//!
//! One generator named after the source publishes the platform chart directory
//! as a single artifact; one release `cozystack-platform` in the hub installs it
//! with the platform's values and its source reference.

use crate::constants::{
    DEFAULT_PLATFORM_GIT_BASE_PATH, DEFAULT_PLATFORM_OCI_BASE_PATH, DEFAULT_RELEASE_INTERVAL,
    INFINITE_RETRIES, KIND_ARTIFACT_GENERATOR, KIND_EXTERNAL_ARTIFACT, KIND_HELM_RELEASE,
    KIND_OCI_REPOSITORY, PLATFORM_RELEASE_NAME,
};
use crate::context::Context;
use crate::crd::{Platform, SourceRef};
use crate::external::{
    ArtifactGenerator, ArtifactGeneratorSpec, CopyOperation, CrossNamespaceSourceReference,
    HelmRelease, HelmReleaseSpec, OutputArtifact, ReleaseAction, Remediation, SourceReference,
};
use crate::labels::PLATFORM;
use crate::naming::{last_path_segment, source_glob};
use crate::reconcilers::resources::{create_or_update, merge_into, owner_reference};
use anyhow::{Context as _, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Chart directory inside the source.
#[must_use]
pub fn platform_base_path(platform: &Platform) -> String {
    match platform.spec.base_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => path.trim_matches('/').to_string(),
        None if platform.spec.source_ref.kind == KIND_OCI_REPOSITORY => {
            DEFAULT_PLATFORM_OCI_BASE_PATH.to_string()
        }
        None => DEFAULT_PLATFORM_GIT_BASE_PATH.to_string(),
    }
}

/// Artifact name: the last segment of the base path.
#[must_use]
pub fn platform_artifact_name(platform: &Platform) -> String {
    last_path_segment(&platform_base_path(platform)).to_string()
}

/// Platform values with `sourceRef` set to the platform's source.
#[must_use]
pub fn platform_values(values: Option<&Value>, source_ref: &SourceRef) -> Value {
    let mut root = match values {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    root.insert(
        "sourceRef".to_string(),
        json!({
            "kind": source_ref.kind,
            "name": source_ref.name,
            "namespace": source_ref.namespace,
        }),
    );
    Value::Object(root)
}

fn platform_labels(platform: &Platform) -> BTreeMap<String, String> {
    BTreeMap::from([(PLATFORM.to_string(), platform.name_any())])
}

#[must_use]
pub fn build_artifact_generator(platform: &Platform, hub_namespace: &str) -> ArtifactGenerator {
    let source_ref = &platform.spec.source_ref;
    let artifact = platform_artifact_name(platform);
    ArtifactGenerator {
        metadata: ObjectMeta {
            name: Some(source_ref.name.clone()),
            namespace: Some(hub_namespace.to_string()),
            labels: Some(platform_labels(platform)),
            owner_references: owner_reference(platform, true).map(|r| vec![r]),
            ..Default::default()
        },
        spec: ArtifactGeneratorSpec {
            sources: vec![SourceReference {
                alias: source_ref.name.clone(),
                kind: source_ref.kind.clone(),
                name: source_ref.name.clone(),
                namespace: Some(source_ref.namespace.clone()),
            }],
            output_artifacts: vec![OutputArtifact {
                name: artifact.clone(),
                origin_revision: None,
                copy: vec![CopyOperation {
                    from: source_glob(&source_ref.name, &platform_base_path(platform), ""),
                    to: format!("@artifact/{artifact}/"),
                    ..Default::default()
                }],
            }],
        },
        status: None,
    }
}

#[must_use]
pub fn build_release(platform: &Platform, hub_namespace: &str) -> HelmRelease {
    let retry_forever = || {
        Some(ReleaseAction {
            remediation: Some(Remediation {
                retries: Some(INFINITE_RETRIES),
            }),
        })
    };
    HelmRelease {
        metadata: ObjectMeta {
            name: Some(PLATFORM_RELEASE_NAME.to_string()),
            namespace: Some(hub_namespace.to_string()),
            labels: Some(platform_labels(platform)),
            owner_references: owner_reference(platform, true).map(|r| vec![r]),
            ..Default::default()
        },
        spec: HelmReleaseSpec {
            chart_ref: Some(CrossNamespaceSourceReference {
                kind: KIND_EXTERNAL_ARTIFACT.to_string(),
                name: platform_artifact_name(platform),
                namespace: Some(hub_namespace.to_string()),
            }),
            interval: platform
                .spec
                .interval
                .clone()
                .unwrap_or_else(|| DEFAULT_RELEASE_INTERVAL.to_string()),
            release_name: Some(PLATFORM_RELEASE_NAME.to_string()),
            target_namespace: Some(hub_namespace.to_string()),
            install: retry_forever(),
            upgrade: retry_forever(),
            values: Some(platform_values(
                platform.spec.values.as_ref(),
                &platform.spec.source_ref,
            )),
            ..Default::default()
        },
        status: None,
    }
}

/// Reconciles a `Platform`.
///
/// # Errors
///
/// Returns an error if the generator or the release cannot be written.
pub async fn reconcile_platform(ctx: Arc<Context>, platform: Arc<Platform>) -> Result<Action> {
    let name = platform.name_any();
    let hub = &ctx.config.hub_namespace;

    let generator = build_artifact_generator(&platform, hub);
    let generator_name = generator.name_any();
    let generators: Api<ArtifactGenerator> = Api::namespaced(ctx.client.clone(), hub);
    let (spec, labels, owners) = (
        generator.spec.clone(),
        platform_labels(&platform),
        generator.metadata.owner_references.clone(),
    );
    create_or_update(&generators, generator, |ag| {
        ag.spec = spec.clone();
        merge_into(&mut ag.metadata.labels, &labels);
        ag.metadata.owner_references = owners.clone();
        Ok(())
    })
    .await
    .with_context(|| format!("failed to reconcile {KIND_ARTIFACT_GENERATOR} {generator_name}"))?;

    let release = build_release(&platform, hub);
    let releases: Api<HelmRelease> = Api::namespaced(ctx.client.clone(), hub);
    let (spec, owners) = (release.spec.clone(), release.metadata.owner_references.clone());
    create_or_update(&releases, release, |hr| {
        hr.spec = spec.clone();
        merge_into(&mut hr.metadata.labels, &labels);
        hr.metadata.owner_references = owners.clone();
        Ok(())
    })
    .await
    .with_context(|| format!("failed to reconcile {KIND_HELM_RELEASE} {PLATFORM_RELEASE_NAME}"))?;

    info!(platform = %name, "Reconciled Platform");
    Ok(Action::await_change())
}

/// Maps a labeled release or generator to its platform.
#[must_use]
pub fn labeled_platform(labels: &BTreeMap<String, String>) -> Option<String> {
    labels.get(PLATFORM).filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod platform_tests;
