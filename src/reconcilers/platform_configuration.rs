// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `PlatformConfiguration` reconciliation: a git source and a release of the
//! chart at a path inside it, both named after the configuration in the hub.

use crate::constants::{DEFAULT_RELEASE_INTERVAL, KIND_GIT_REPOSITORY};
use crate::context::Context;
use crate::crd::PlatformConfiguration;
use crate::external::{
    CrossNamespaceSourceReference, GitRepository, GitRepositorySpec, HelmChartTemplate,
    HelmChartTemplateSpec, HelmRelease, HelmReleaseSpec,
};
use crate::reconcilers::resources::{create_or_update, owner_reference};
use anyhow::{Context as _, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use std::sync::Arc;
use tracing::info;

fn metadata(config: &PlatformConfiguration, hub_namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(config.name_any()),
        namespace: Some(hub_namespace.to_string()),
        owner_references: owner_reference(config, true).map(|r| vec![r]),
        ..Default::default()
    }
}

#[must_use]
pub fn build_git_repository(config: &PlatformConfiguration, hub_namespace: &str) -> GitRepository {
    let source = &config.spec.source;
    GitRepository {
        metadata: metadata(config, hub_namespace),
        spec: GitRepositorySpec {
            url: source.url.clone(),
            r#ref: source.r#ref.clone(),
            interval: source
                .interval
                .clone()
                .unwrap_or_else(|| DEFAULT_RELEASE_INTERVAL.to_string()),
            timeout: source.timeout.clone(),
            secret_ref: source.secret_ref.clone(),
            ignore: source.ignore.clone(),
        },
    }
}

#[must_use]
pub fn build_release(config: &PlatformConfiguration, hub_namespace: &str) -> HelmRelease {
    let name = config.name_any();
    HelmRelease {
        metadata: metadata(config, hub_namespace),
        spec: HelmReleaseSpec {
            chart: Some(HelmChartTemplate {
                spec: HelmChartTemplateSpec {
                    chart: config.spec.chart.path.clone(),
                    source_ref: CrossNamespaceSourceReference {
                        kind: KIND_GIT_REPOSITORY.to_string(),
                        name: name.clone(),
                        namespace: Some(hub_namespace.to_string()),
                    },
                    ..Default::default()
                },
            }),
            interval: config
                .spec
                .chart
                .interval
                .clone()
                .unwrap_or_else(|| DEFAULT_RELEASE_INTERVAL.to_string()),
            release_name: Some(name),
            target_namespace: Some(hub_namespace.to_string()),
            values: config.spec.values.clone(),
            ..Default::default()
        },
        status: None,
    }
}

/// Reconciles a `PlatformConfiguration`.
///
/// # Errors
///
/// Returns an error if the source or the release cannot be written.
pub async fn reconcile_platform_configuration(
    ctx: Arc<Context>,
    config: Arc<PlatformConfiguration>,
) -> Result<Action> {
    let name = config.name_any();
    let hub = &ctx.config.hub_namespace;

    let repository = build_git_repository(&config, hub);
    let repositories: Api<GitRepository> = Api::namespaced(ctx.client.clone(), hub);
    let (spec, owners) = (repository.spec.clone(), repository.metadata.owner_references.clone());
    create_or_update(&repositories, repository, |repo| {
        repo.spec = spec.clone();
        repo.metadata.owner_references = owners.clone();
        Ok(())
    })
    .await
    .context("failed to create or update GitRepository")?;

    let release = build_release(&config, hub);
    let releases: Api<HelmRelease> = Api::namespaced(ctx.client.clone(), hub);
    let (spec, owners) = (release.spec.clone(), release.metadata.owner_references.clone());
    create_or_update(&releases, release, |hr| {
        hr.spec = spec.clone();
        hr.metadata.owner_references = owners.clone();
        Ok(())
    })
    .await
    .context("failed to create or update HelmRelease")?;

    info!(platform_configuration = %name, "Reconciled PlatformConfiguration");
    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "platform_configuration_tests.rs"]
mod platform_configuration_tests;
