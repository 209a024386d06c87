// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unsticks releases whose newest Helm history entry never deployed.
//!
//! Once Helm's newest `sh.helm.release.v1.*` secret describes a release that
//! failed before its first deploy, every further attempt fails with "has no
//! deployed releases". The plunger suspends the release, deletes that secret,
//! records the deleted history version in an annotation and resumes the
//! release.
//!
//! The annotation holds the deleted version, so a release whose newest
//! remaining version is one below it has already been handled. A release left
//! suspended by a crash between the steps is resumed on the next pass.

use crate::constants::{
    HELM_RELEASE_SECRET_TYPE, HELM_STORAGE_OWNER, KIND_HELM_RELEASE, NO_DEPLOYED_RELEASES_MESSAGE,
};
use crate::context::Context;
use crate::external::HelmRelease;
use crate::labels::LAST_PROCESSED_VERSION_ANNOTATION;
use crate::metrics::{record_reconciliation_requeue, record_resource_updated};
use crate::reconcilers::resources::delete_if_exists;
use crate::reconcilers::retry::is_conflict;
use crate::status_reasons::{CONDITION_FALSE, CONDITION_TYPE_READY};
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::api::{ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// What a pass does with one release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlungerAction {
    /// Nothing to fix, or the release was suspended by someone else.
    Skip,
    /// The stale secret is already gone; only the suspend is left to undo.
    Resume,
    /// Delete `secret`, which holds history version `version`.
    Plunge { secret: String, version: u64 },
}

/// Whether the release reports the "has no deployed releases" failure.
#[must_use]
pub fn has_no_deployed_releases(release: &HelmRelease) -> bool {
    release.status.as_ref().is_some_and(|status| {
        status.conditions.iter().any(|c| {
            c.r#type == CONDITION_TYPE_READY
                && c.status == CONDITION_FALSE
                && c.message
                    .as_deref()
                    .is_some_and(|m| m.contains(NO_DEPLOYED_RELEASES_MESSAGE))
        })
    })
}

/// Version recorded by the last plunge. Unparseable values count as unset.
#[must_use]
pub fn processed_version(release: &HelmRelease) -> Option<u64> {
    release
        .annotations()
        .get(LAST_PROCESSED_VERSION_ANNOTATION)
        .and_then(|v| v.parse().ok())
}

/// Releases worth a pass: failing ones, and ones we may have left suspended.
#[must_use]
pub fn needs_attention(release: &HelmRelease) -> bool {
    has_no_deployed_releases(release)
        || (release.spec.suspend && release.annotations().contains_key(LAST_PROCESSED_VERSION_ANNOTATION))
}

/// History version from a storage secret name, `sh.helm.release.v1.<release>.v<N>`.
/// Names without a numeric suffix count as version 0.
#[must_use]
pub fn secret_version(name: &str) -> u64 {
    name.rsplit('.')
        .next()
        .map(|suffix| suffix.strip_prefix('v').unwrap_or(suffix))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Newest Helm storage secret and its version.
#[must_use]
pub fn latest_release_secret(secrets: &[Secret]) -> Option<(&Secret, u64)> {
    secrets
        .iter()
        .filter(|s| s.type_.as_deref() == Some(HELM_RELEASE_SECRET_TYPE))
        .map(|s| (s, secret_version(&s.name_any())))
        .max_by_key(|(_, version)| *version)
}

/// Name Helm stores the release history under.
#[must_use]
pub fn storage_name(release: &HelmRelease) -> String {
    release.spec.release_name.clone().unwrap_or_else(|| release.name_any())
}

/// Decides what to do with `release` given its storage secrets.
#[must_use]
pub fn plan(release: &HelmRelease, secrets: &[Secret]) -> PlungerAction {
    let latest = latest_release_secret(secrets);
    let latest_version = latest.map_or(0, |(_, version)| version);
    let handled = processed_version(release) == Some(latest_version + 1);

    if release.spec.suspend {
        return if handled { PlungerAction::Resume } else { PlungerAction::Skip };
    }
    if handled || !has_no_deployed_releases(release) {
        return PlungerAction::Skip;
    }
    match latest {
        Some((secret, version)) => PlungerAction::Plunge {
            secret: secret.name_any(),
            version,
        },
        None => PlungerAction::Skip,
    }
}

async fn release_secrets(api: &Api<Secret>, storage: &str) -> Result<Vec<Secret>> {
    let params = ListParams::default().labels(&format!("name={storage},owner={HELM_STORAGE_OWNER}"));
    let list = api
        .list(&params)
        .await
        .with_context(|| format!("failed to list release secrets of {storage}"))?;
    Ok(list.items)
}

/// Merge-patches a release, guarded by `resource_version` when given.
async fn patch_release(
    api: &Api<HelmRelease>,
    name: &str,
    resource_version: Option<String>,
    mut patch: Value,
) -> kube::Result<HelmRelease> {
    if let Some(resource_version) = resource_version {
        patch["metadata"]["resourceVersion"] = json!(resource_version);
    }
    let updated = api.patch(name, &PatchParams::default(), &Patch::Merge(&patch)).await?;
    record_resource_updated(KIND_HELM_RELEASE);
    Ok(updated)
}

/// Runs one pass over `release`. Returns the action taken.
///
/// Suspending is guarded by the release's resource version; losing that race
/// skips the pass, and the write that won it triggers the next one.
///
/// # Errors
///
/// Returns an error if secrets cannot be listed or a write fails.
pub async fn plunge_release(client: &Client, release: &HelmRelease) -> Result<PlungerAction> {
    let name = release.name_any();
    let namespace = release.namespace().unwrap_or_default();
    let secrets: Api<Secret> = Api::namespaced(client.clone(), &namespace);
    let releases: Api<HelmRelease> = Api::namespaced(client.clone(), &namespace);

    let found = release_secrets(&secrets, &storage_name(release)).await?;
    let action = plan(release, &found);
    match &action {
        PlungerAction::Skip => {
            debug!(name = %name, namespace = %namespace, "Nothing to plunge");
        }
        PlungerAction::Resume => {
            info!(name = %name, namespace = %namespace, "Release secret already removed, resuming release");
            patch_release(&releases, &name, None, json!({"spec": {"suspend": false}}))
                .await
                .context("failed to resume release")?;
        }
        PlungerAction::Plunge { secret, version } => {
            info!(
                name = %name,
                namespace = %namespace,
                secret = %secret,
                version,
                "Suspending release stuck on a stale history secret"
            );
            match patch_release(
                &releases,
                &name,
                release.resource_version(),
                json!({"spec": {"suspend": true}}),
            )
            .await
            {
                Ok(_) => {}
                Err(e) if is_conflict(&e) => {
                    debug!(name = %name, namespace = %namespace, "Release changed while suspending, skipping pass");
                    record_reconciliation_requeue(KIND_HELM_RELEASE, "conflict");
                    return Ok(PlungerAction::Skip);
                }
                Err(e) => return Err(e).context("failed to suspend release"),
            }

            delete_if_exists(&secrets, secret, "Secret").await?;

            patch_release(
                &releases,
                &name,
                None,
                json!({"metadata": {"annotations": {LAST_PROCESSED_VERSION_ANNOTATION: version.to_string()}}}),
            )
            .await
            .context("failed to record processed version")?;

            patch_release(&releases, &name, None, json!({"spec": {"suspend": false}}))
                .await
                .context("failed to resume release")?;
            info!(name = %name, namespace = %namespace, version, "Plunged release");
        }
    }
    Ok(action)
}

/// Reconciles one `HelmRelease`.
///
/// # Errors
///
/// Returns an error when a pass fails; see [`plunge_release`].
pub async fn reconcile_flux_plunger(ctx: Arc<Context>, release: Arc<HelmRelease>) -> Result<Action> {
    if needs_attention(&release) {
        plunge_release(&ctx.client, &release).await?;
    }
    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "flux_plunger_tests.rs"]
mod flux_plunger_tests;
