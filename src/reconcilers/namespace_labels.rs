// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Propagates `namespace.cozystack.io/*` namespace labels into the `_namespace`
//! values key of every release in the namespace.

use crate::constants::KIND_HELM_RELEASE;
use crate::context::Context;
use crate::external::HelmRelease;
use crate::metrics::record_resource_updated;
use crate::values::{namespace_values, sync_namespace_values};
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ListParams, PostParams};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Api, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Applies the namespace values to a release in place. Returns whether it changed.
pub fn apply_namespace_values(release: &mut HelmRelease, namespace_values: &BTreeMap<String, String>) -> bool {
    match sync_namespace_values(release.spec.values.as_ref(), namespace_values) {
        Some(values) => {
            release.spec.values = Some(values);
            true
        }
        None => false,
    }
}

/// Reconciles the releases of one namespace.
///
/// # Errors
///
/// Returns an error if the releases cannot be listed. Per-release update
/// failures are logged and skipped.
pub async fn reconcile_namespace_labels(ctx: Arc<Context>, namespace: Arc<Namespace>) -> Result<Action> {
    let name = namespace.name_any();
    let values = namespace_values(namespace.labels());

    let api: Api<HelmRelease> = Api::namespaced(ctx.client.clone(), &name);
    let releases = api
        .list(&ListParams::default())
        .await
        .with_context(|| format!("failed to list releases in namespace {name}"))?;

    let mut updated = 0usize;
    for mut release in releases {
        if !apply_namespace_values(&mut release, &values) {
            continue;
        }
        let release_name = release.name_any();
        match api.replace(&release_name, &PostParams::default(), &release).await {
            Ok(_) => {
                debug!(name = %release_name, namespace = %name, "Synced namespace values");
                record_resource_updated(KIND_HELM_RELEASE);
                updated += 1;
            }
            Err(e) => {
                error!(name = %release_name, namespace = %name, error = %e, "Failed to update release");
            }
        }
    }

    if updated > 0 {
        info!(namespace = %name, count = updated, "Updated releases with namespace labels");
    }
    Ok(Action::await_change())
}

/// Maps a release to its namespace so new releases get the values too.
#[must_use]
pub fn release_namespace(release: &HelmRelease) -> Option<ObjectRef<Namespace>> {
    release.namespace().map(|ns| ObjectRef::new(&ns))
}

#[cfg(test)]
#[path = "namespace_labels_tests.rs"]
mod namespace_labels_tests;
