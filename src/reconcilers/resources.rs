// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Generic create-or-update helpers for Kubernetes resources.
//!
//! Reconcilers describe the state they own with a mutate closure. The same
//! closure is applied to a fresh template (create) or to the live object
//! (update), and the object is only written when the result differs from what
//! the API server holds.
//!
//! # Example
//!
//! ```rust,no_run
//! use cozystack_operator::reconcilers::resources::create_or_update;
//! use k8s_openapi::api::core::v1::Namespace;
//! use kube::{Api, Client};
//! use anyhow::Result;
//!
//! async fn example(client: Client, template: Namespace) -> Result<()> {
//!     let api: Api<Namespace> = Api::all(client);
//!     create_or_update(&api, template, |ns| {
//!         ns.metadata
//!             .labels
//!             .get_or_insert_with(Default::default)
//!             .insert("cozystack.io/system".into(), "true".into());
//!         Ok(())
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

use crate::labels::{
    HELM_RESOURCE_POLICY, HELM_RESOURCE_POLICY_KEEP, POD_SECURITY_ENFORCE,
    POD_SECURITY_PRIVILEGED, SYSTEM_NAMESPACE, TRUE,
};
use crate::metrics::{record_resource_created, record_resource_deleted, record_resource_updated};
use anyhow::{anyhow, Context, Result};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::{debug, info};

/// What [`create_or_update`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Created,
    Updated,
    Unchanged,
}

fn kind_of<K: Serialize>(object: &K) -> String {
    serde_json::to_value(object)
        .ok()
        .and_then(|v| v.get("kind").and_then(|k| k.as_str()).map(String::from))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Whether two objects differ, ignoring server-maintained metadata and status.
#[must_use]
pub fn differs<K: Serialize>(current: &K, desired: &K) -> bool {
    fn strip(value: serde_json::Value) -> serde_json::Value {
        let mut value = value;
        if let Some(map) = value.as_object_mut() {
            map.remove("status");
            if let Some(meta) = map.get_mut("metadata").and_then(|m| m.as_object_mut()) {
                for key in [
                    "resourceVersion",
                    "managedFields",
                    "generation",
                    "creationTimestamp",
                    "uid",
                ] {
                    meta.remove(key);
                }
            }
        }
        value
    }
    match (serde_json::to_value(current), serde_json::to_value(desired)) {
        (Ok(a), Ok(b)) => strip(a) != strip(b),
        _ => true,
    }
}

/// Create `template` after mutating it, or mutate the live object and replace
/// it when the result differs.
///
/// # Errors
///
/// Returns an error if the template has no name, `mutate` fails or an API call fails.
pub async fn create_or_update<K, F>(api: &Api<K>, template: K, mut mutate: F) -> Result<Operation>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
    F: FnMut(&mut K) -> Result<()>,
{
    let name = template
        .meta()
        .name
        .clone()
        .ok_or_else(|| anyhow!("resource must have a name"))?;
    let kind = kind_of(&template);

    match api
        .get_opt(&name)
        .await
        .with_context(|| format!("failed to get {kind} {name}"))?
    {
        None => {
            let mut desired = template;
            mutate(&mut desired)?;
            api.create(&PostParams::default(), &desired)
                .await
                .with_context(|| format!("failed to create {kind} {name}"))?;
            info!(kind = %kind, name = %name, "Created resource");
            record_resource_created(&kind);
            Ok(Operation::Created)
        }
        Some(current) => {
            let mut desired = current.clone();
            mutate(&mut desired)?;
            if !differs(&current, &desired) {
                debug!(kind = %kind, name = %name, "Resource unchanged");
                return Ok(Operation::Unchanged);
            }
            api.replace(&name, &PostParams::default(), &desired)
                .await
                .with_context(|| format!("failed to update {kind} {name}"))?;
            info!(kind = %kind, name = %name, "Updated resource");
            record_resource_updated(&kind);
            Ok(Operation::Updated)
        }
    }
}

/// Delete `name`, treating a missing object as success. Returns whether a delete was issued.
///
/// # Errors
///
/// Returns an error if the delete fails for any reason other than not-found.
pub async fn delete_if_exists<K>(api: &Api<K>, name: &str, kind: &str) -> Result<bool>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            info!(kind = %kind, name = %name, "Deleted resource");
            record_resource_deleted(kind);
            Ok(true)
        }
        Err(e) if super::retry::is_not_found(&e) => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to delete {kind} {name}")),
    }
}

/// Merges `extra` into `target`, creating the map when missing.
pub fn merge_into(target: &mut Option<BTreeMap<String, String>>, extra: &BTreeMap<String, String>) {
    if extra.is_empty() {
        return;
    }
    let map = target.get_or_insert_with(BTreeMap::new);
    for (k, v) in extra {
        map.insert(k.clone(), v.clone());
    }
}

/// Labels a platform-managed namespace gets on top of caller-provided ones.
#[must_use]
pub fn namespace_labels(
    name: &str,
    privileged: bool,
    tenant_prefix: &str,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    if !name.starts_with(tenant_prefix) {
        labels.insert(SYSTEM_NAMESPACE.to_string(), TRUE.to_string());
    }
    if privileged {
        labels.insert(
            POD_SECURITY_ENFORCE.to_string(),
            POD_SECURITY_PRIVILEGED.to_string(),
        );
    }
    labels
}

/// Creates or updates a namespace, merging (never replacing) labels and
/// annotations. The namespace is annotated so Helm never deletes it.
///
/// # Errors
///
/// Returns an error if the name is empty or an API call fails.
pub async fn ensure_namespace(
    client: &Client,
    name: &str,
    privileged: bool,
    extra_labels: &BTreeMap<String, String>,
    tenant_prefix: &str,
) -> Result<Operation> {
    if name.is_empty() {
        return Err(anyhow!("namespace name must not be empty"));
    }
    let api: Api<Namespace> = Api::all(client.clone());
    let template = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    let mut labels = namespace_labels(name, privileged, tenant_prefix);
    labels.extend(extra_labels.clone());
    let annotations = BTreeMap::from([(
        HELM_RESOURCE_POLICY.to_string(),
        HELM_RESOURCE_POLICY_KEEP.to_string(),
    )]);

    create_or_update(&api, template, |ns| {
        merge_into(&mut ns.metadata.labels, &labels);
        merge_into(&mut ns.metadata.annotations, &annotations);
        Ok(())
    })
    .await
}

/// Owner reference to `owner`, marked as controller when `controller` is set.
///
/// Returns `None` when the owner has no name or UID yet (not persisted).
#[must_use]
pub fn owner_reference<K>(owner: &K, controller: bool) -> Option<OwnerReference>
where
    K: Resource<DynamicType = ()>,
{
    if controller {
        owner.controller_owner_ref(&())
    } else {
        owner.owner_ref(&())
    }
}

/// Whether `owner` is among the object's owner references (by UID).
#[must_use]
pub fn is_owned_by<K: Resource, O: Resource>(object: &K, owner: &O) -> bool {
    let Some(uid) = owner.meta().uid.as_deref() else {
        return false;
    };
    object.owner_references().iter().any(|r| r.uid == uid)
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
