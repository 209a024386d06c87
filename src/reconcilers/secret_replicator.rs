// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Replicates the platform values secret from the hub into every namespace
//! that hosts a package-managed release, and removes replicas from namespaces
//! that no longer host one.

use crate::constants::VALUES_SECRET_NAME;
use crate::context::Context;
use crate::external::HelmRelease;
use crate::labels::{PACKAGE, REPLICATED_FROM};
use crate::reconcilers::resources::{create_or_update, delete_if_exists, merge_into};
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Api, ResourceExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Namespaces that need a replica: those hosting a package-managed release,
/// except the hub itself.
#[must_use]
pub fn target_namespaces(releases: &[HelmRelease], hub_namespace: &str) -> BTreeSet<String> {
    releases
        .iter()
        .filter(|hr| hr.labels().contains_key(PACKAGE))
        .filter_map(ResourceExt::namespace)
        .filter(|ns| ns != hub_namespace)
        .collect()
}

/// Replica of `source` in `namespace`.
#[must_use]
pub fn build_replica(source: &Secret, namespace: &str, hub_namespace: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(source.name_any()),
            namespace: Some(namespace.to_string()),
            labels: Some(BTreeMap::from([(
                REPLICATED_FROM.to_string(),
                hub_namespace.to_string(),
            )])),
            ..Default::default()
        },
        data: source.data.clone(),
        type_: source.type_.clone(),
        ..Default::default()
    }
}

/// Replicas (by namespace) that should no longer exist.
#[must_use]
pub fn orphaned_replicas(replicas: &[Secret], active: &BTreeSet<String>) -> Vec<String> {
    replicas
        .iter()
        .filter(|s| s.name_any() == VALUES_SECRET_NAME)
        .filter_map(ResourceExt::namespace)
        .filter(|ns| !active.contains(ns))
        .collect()
}

/// The source secret every watched release maps to.
#[must_use]
pub fn source_secret_ref(hub_namespace: &str) -> ObjectRef<Secret> {
    ObjectRef::new(VALUES_SECRET_NAME).within(hub_namespace)
}

/// Reconciles the replicas of the hub values secret.
///
/// # Errors
///
/// Returns an error if releases cannot be listed. Per-namespace failures are
/// logged and skipped.
pub async fn reconcile_secret_replicas(ctx: Arc<Context>, source: Arc<Secret>) -> Result<Action> {
    let hub = &ctx.config.hub_namespace;
    if source.name_any() != VALUES_SECRET_NAME || source.namespace().as_deref() != Some(hub.as_str()) {
        return Ok(Action::await_change());
    }

    let releases: Api<HelmRelease> = Api::all(ctx.client.clone());
    let list = releases
        .list(&ListParams::default().labels(PACKAGE))
        .await
        .context("failed to list package releases")?;
    let active = target_namespaces(&list.items, hub);

    for namespace in &active {
        let api: Api<Secret> = Api::namespaced(ctx.client.clone(), namespace);
        let replica = build_replica(&source, namespace, hub);
        let (data, type_) = (replica.data.clone(), replica.type_.clone());
        let hub_label = BTreeMap::from([(REPLICATED_FROM.to_string(), hub.clone())]);
        let result = create_or_update(&api, replica, |s| {
            s.data = data.clone();
            s.type_ = type_.clone();
            merge_into(&mut s.metadata.labels, &hub_label);
            Ok(())
        })
        .await;
        match result {
            Ok(op) => debug!(namespace = %namespace, operation = ?op, "Replicated values secret"),
            Err(e) => error!(namespace = %namespace, error = %e, "Failed to replicate values secret"),
        }
    }

    let all: Api<Secret> = Api::all(ctx.client.clone());
    match all
        .list(&ListParams::default().labels(&format!("{REPLICATED_FROM}={hub}")))
        .await
    {
        Ok(replicas) => {
            for namespace in orphaned_replicas(&replicas.items, &active) {
                info!(namespace = %namespace, "Deleting orphaned values secret");
                let api: Api<Secret> = Api::namespaced(ctx.client.clone(), &namespace);
                if let Err(e) = delete_if_exists(&api, VALUES_SECRET_NAME, "Secret").await {
                    error!(namespace = %namespace, error = %e, "Failed to delete orphaned values secret");
                }
            }
        }
        Err(e) => error!(error = %e, "Failed to list replicated secrets"),
    }

    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "secret_replicator_tests.rs"]
mod secret_replicator_tests;
