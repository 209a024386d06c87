// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rolls the extended API server whenever application definitions change.
//!
//! Definition events are only recorded by the watch mapper. The single
//! reconcile key (the API workload) then waits until no event arrived for the
//! debounce interval, hashes every definition and writes the hash into the
//! workload's pod template annotation. A changed annotation triggers a rollout.

use crate::config::WorkloadKind;
use crate::context::Context;
use crate::crd::{ApplicationDefinition, ApplicationDefinitionSpec};
use crate::labels::CONFIG_HASH_ANNOTATION;
use crate::metrics::record_resource_updated;
use anyhow::{Context as _, Result};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::api::{ListParams, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct DebounceState {
    last_event: Option<Instant>,
    last_handled: Option<Instant>,
}

/// What the debouncer wants the reconcile to do now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebounceDecision {
    /// Nothing pending.
    Idle,
    /// Events are still arriving; come back later.
    Wait(Duration),
    /// Handle everything up to this event.
    Fire(Instant),
}

/// Tracks definition events and decides when a rollout is due.
#[derive(Debug)]
pub struct Debouncer {
    debounce: Duration,
    state: Mutex<DebounceState>,
}

impl Debouncer {
    #[must_use]
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: Mutex::new(DebounceState::default()),
        }
    }

    pub fn record_event(&self) {
        self.record_event_at(Instant::now());
    }

    pub fn record_event_at(&self, at: Instant) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.last_event = Some(at);
    }

    #[must_use]
    pub fn poll(&self, now: Instant) -> DebounceDecision {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(last_event) = state.last_event else {
            return DebounceDecision::Idle;
        };
        let quiet = now.saturating_duration_since(last_event);
        if quiet < self.debounce {
            return DebounceDecision::Wait(self.debounce - quiet);
        }
        if state.last_handled.is_some_and(|handled| handled >= last_event) {
            return DebounceDecision::Idle;
        }
        DebounceDecision::Fire(last_event)
    }

    pub fn mark_handled(&self, event: Instant) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.last_handled = Some(event);
    }
}

/// Context of the config-hash controller.
pub struct ConfigHashContext {
    pub ctx: Arc<Context>,
    pub debouncer: Debouncer,
}

#[derive(Serialize)]
struct HashView<'a> {
    name: String,
    spec: &'a ApplicationDefinitionSpec,
}

/// SHA-256 (hex) over the name-sorted `{name, spec}` list of `definitions`.
///
/// # Errors
///
/// Returns an error if a spec cannot be serialized.
pub fn definitions_hash(definitions: &[ApplicationDefinition]) -> Result<String, serde_json::Error> {
    let mut views: Vec<HashView<'_>> = definitions
        .iter()
        .map(|d| HashView {
            name: d.name_any(),
            spec: &d.spec,
        })
        .collect();
    views.sort_by(|a, b| a.name.cmp(&b.name));
    let encoded = serde_json::to_vec(&views)?;
    Ok(format!("{:x}", Sha256::digest(&encoded)))
}

/// Current hash annotation of a pod template, empty when unset.
#[must_use]
pub fn template_hash(template: &PodTemplateSpec) -> String {
    template
        .metadata
        .as_ref()
        .and_then(|m| m.annotations.as_ref())
        .and_then(|a| a.get(CONFIG_HASH_ANNOTATION))
        .cloned()
        .unwrap_or_default()
}

/// Merge patch setting the hash annotation on the pod template.
#[must_use]
pub fn hash_patch(hash: &str) -> serde_json::Value {
    json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": { CONFIG_HASH_ANNOTATION: hash }
                }
            }
        }
    })
}

/// The reconcile key of the controller.
#[must_use]
pub fn workload_ref<K>(namespace: &str, name: &str) -> ObjectRef<K>
where
    K: Resource<DynamicType = ()>,
{
    ObjectRef::new(name).within(namespace)
}

/// Hash currently on the workload, `None` if the workload does not exist.
async fn current_hash(client: &Client, kind: WorkloadKind, namespace: &str, name: &str) -> Result<Option<String>> {
    let template = match kind {
        WorkloadKind::Deployment => Api::<Deployment>::namespaced(client.clone(), namespace)
            .get_opt(name)
            .await?
            .and_then(|d| d.spec)
            .map(|s| s.template),
        WorkloadKind::DaemonSet => Api::<DaemonSet>::namespaced(client.clone(), namespace)
            .get_opt(name)
            .await?
            .and_then(|d| d.spec)
            .map(|s| s.template),
    };
    Ok(template.as_ref().map(template_hash))
}

async fn write_hash(client: &Client, kind: WorkloadKind, namespace: &str, name: &str, hash: &str) -> Result<()> {
    let patch = hash_patch(hash);
    let params = PatchParams::default();
    match kind {
        WorkloadKind::Deployment => {
            Api::<Deployment>::namespaced(client.clone(), namespace)
                .patch(name, &params, &Patch::Merge(&patch))
                .await?;
        }
        WorkloadKind::DaemonSet => {
            Api::<DaemonSet>::namespaced(client.clone(), namespace)
                .patch(name, &params, &Patch::Merge(&patch))
                .await?;
        }
    }
    Ok(())
}

/// Reconciles the config hash on the API workload.
///
/// The reconciled object is only the key; the workload is read by the
/// configured kind.
///
/// # Errors
///
/// Returns an error if definitions cannot be listed or the workload cannot be
/// read or patched.
pub async fn reconcile_config_hash<K>(hashing: Arc<ConfigHashContext>, _workload: Arc<K>) -> Result<Action>
where
    K: Resource,
{
    let event = match hashing.debouncer.poll(Instant::now()) {
        DebounceDecision::Idle => return Ok(Action::await_change()),
        DebounceDecision::Wait(remaining) => return Ok(Action::requeue(remaining)),
        DebounceDecision::Fire(event) => event,
    };

    let ctx = &hashing.ctx;
    let definitions: Api<ApplicationDefinition> = Api::all(ctx.client.clone());
    let list = definitions
        .list(&ListParams::default())
        .await
        .context("failed to list application definitions")?;
    let hash = definitions_hash(&list.items).context("failed to hash application definitions")?;

    let kind = ctx.config.config_hash_kind;
    let namespace = ctx.config.config_hash_namespace();
    let name = ctx.config.config_hash_name.as_str();
    let Some(old) = current_hash(&ctx.client, kind, namespace, name)
        .await
        .with_context(|| format!("failed to read {kind:?} {namespace}/{name}"))?
    else {
        debug!(kind = ?kind, namespace = %namespace, name = %name, "Config hash target not found");
        hashing.debouncer.mark_handled(event);
        return Ok(Action::await_change());
    };

    if old == hash {
        info!(hash = %hash, "No changes in definitions; skipping restart");
        hashing.debouncer.mark_handled(event);
        return Ok(Action::await_change());
    }

    write_hash(&ctx.client, kind, namespace, name, &hash)
        .await
        .with_context(|| format!("failed to patch {kind:?} {namespace}/{name}"))?;
    hashing.debouncer.mark_handled(event);
    record_resource_updated(&format!("{kind:?}"));
    info!(old = %old, new = %hash, name = %name, "Updated pod template config hash; rollout triggered");
    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "config_hash_tests.rs"]
mod config_hash_tests;
