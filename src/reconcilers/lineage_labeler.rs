// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Labels user objects in tenant namespaces with the application they belong to.
//!
//! One controller runs per configured kind, each over `DynamicObject`s. Labels
//! are written with server-side apply under a dedicated field manager, never
//! forcing ownership, so other writers of the same object are left alone.

use crate::constants::LINEAGE_FIELD_MANAGER;
use crate::context::Context;
use crate::crd::ApplicationDefinition;
use crate::lineage::{find_applications, has_lineage_labels, ApplicationIdentity, ObjectGraph};
use crate::metrics::record_resource_updated;
use crate::reconcilers::retry::{conflict_requeue, is_conflict};
use anyhow::{Context as _, Result};
use kube::api::{ApiResource, DynamicObject, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Requeue while the chart registry has not been filled yet.
const EMPTY_REGISTRY_REQUEUE_SECS: u64 = 2;

/// Per-kind context of a lineage controller.
pub struct LineageContext {
    pub ctx: Arc<Context>,
    pub graph: Arc<dyn ObjectGraph>,
    pub resource: ApiResource,
    pub namespaced: bool,
}

/// Whether objects in `namespace` are labeled at all.
#[must_use]
pub fn in_scope(namespace: Option<&str>, tenant_prefix: &str) -> bool {
    namespace.is_some_and(|ns| !ns.is_empty() && ns.starts_with(tenant_prefix))
}

/// Server-side apply body carrying only the lineage labels.
#[must_use]
pub fn lineage_patch(resource: &ApiResource, object: &DynamicObject, identity: &ApplicationIdentity) -> Value {
    let mut metadata = json!({
        "name": object.name_any(),
        "labels": identity.labels(),
    });
    if let Some(namespace) = object.namespace() {
        metadata["namespace"] = json!(namespace);
    }
    json!({
        "apiVersion": resource.api_version,
        "kind": resource.kind,
        "metadata": metadata,
    })
}

/// Picks the application to label with: the nearest one, logging ambiguity.
#[must_use]
pub fn choose_identity(object: &DynamicObject, identities: Vec<ApplicationIdentity>) -> Option<ApplicationIdentity> {
    if identities.len() > 1 {
        debug!(
            name = %object.name_any(),
            namespace = ?object.namespace(),
            candidates = identities.len(),
            "Lineage ambiguous, using first ancestor"
        );
    }
    identities.into_iter().next()
}

async fn ensure_registry(ctx: &Context) -> bool {
    if !ctx.registry.is_empty().await {
        return true;
    }
    let definitions: Vec<ApplicationDefinition> = ctx
        .stores
        .definitions()
        .iter()
        .map(|d| d.as_ref().clone())
        .collect();
    ctx.registry.replace(&definitions).await;
    !ctx.registry.is_empty().await
}

/// Reconciles the lineage labels of one object.
///
/// # Errors
///
/// Returns an error if an ancestor cannot be read or the patch fails for a
/// reason other than a conflict.
pub async fn reconcile_lineage(lineage: Arc<LineageContext>, object: Arc<DynamicObject>) -> Result<Action> {
    let ctx = &lineage.ctx;
    let namespace = object.namespace();
    if !in_scope(namespace.as_deref(), &ctx.config.tenant_prefix) {
        return Ok(Action::await_change());
    }
    if has_lineage_labels(object.labels()) {
        return Ok(Action::await_change());
    }
    if !ensure_registry(ctx).await {
        return Ok(Action::requeue(Duration::from_secs(EMPTY_REGISTRY_REQUEUE_SECS)));
    }

    let identities = find_applications(lineage.graph.as_ref(), &ctx.registry, &object).await?;
    let Some(identity) = choose_identity(&object, identities) else {
        debug!(name = %object.name_any(), namespace = ?namespace, "No owning application found");
        return Ok(Action::await_change());
    };

    let api: Api<DynamicObject> = match (&namespace, lineage.namespaced) {
        (Some(ns), true) => Api::namespaced_with(ctx.client.clone(), ns, &lineage.resource),
        _ => Api::all_with(ctx.client.clone(), &lineage.resource),
    };
    let patch = lineage_patch(&lineage.resource, &object, &identity);
    let name = object.name_any();
    match api
        .patch(&name, &PatchParams::apply(LINEAGE_FIELD_MANAGER), &Patch::Apply(&patch))
        .await
    {
        Ok(_) => {
            info!(
                kind = %lineage.resource.kind,
                name = %name,
                namespace = ?namespace,
                application = %identity.name,
                "Applied lineage labels"
            );
            record_resource_updated(&lineage.resource.kind);
            Ok(Action::await_change())
        }
        Err(e) if is_conflict(&e) => Ok(conflict_requeue()),
        Err(e) => Err(e).with_context(|| format!("failed to apply lineage labels to {name}")),
    }
}

#[cfg(test)]
#[path = "lineage_labeler_tests.rs"]
mod lineage_labeler_tests;
