// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Renders an `ApplicationDefinition`'s workload-monitor templates for each of
//! its releases and keeps the resulting `WorkloadMonitor`s in sync.

use crate::context::Context;
use crate::crd::{ApplicationDefinition, WorkloadMonitorTemplate};
use crate::external::{HelmRelease, WorkloadMonitor, WorkloadMonitorSpec};
use crate::labels::{TRUE, WORKLOAD_MONITOR_OWNED, WORKLOAD_MONITOR_RELEASE};
use crate::reconcilers::resources::{create_or_update, delete_if_exists, merge_into, owner_reference};
use crate::template::{evaluate_condition, render};
use anyhow::{Context as _, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::ListParams;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Template data for monitor templates: release identity, chart version and values.
#[must_use]
pub fn template_data(release: &HelmRelease) -> Value {
    let values = match &release.spec.values {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        _ => json!({}),
    };
    json!({
        "Release": {
            "Name": release.name_any(),
            "Namespace": release.namespace().unwrap_or_default(),
        },
        "Chart": {"Version": release.chart_version().unwrap_or_default()},
        "Values": values,
    })
}

fn render_count(expression: Option<&str>, data: &Value, field: &str) -> Option<i32> {
    let expression = expression.filter(|e| !e.is_empty())?;
    match render(expression, data) {
        Ok(rendered) => rendered.parse().ok(),
        Err(e) => {
            error!(field = %field, template = %expression, error = %e, "Failed to render monitor field");
            None
        }
    }
}

/// Renders one template. Returns `None` when its condition is false or its
/// name cannot be rendered.
#[must_use]
pub fn render_monitor(
    template: &WorkloadMonitorTemplate,
    release: &HelmRelease,
    data: &Value,
) -> Option<WorkloadMonitor> {
    if let Some(condition) = template.condition.as_deref() {
        match evaluate_condition(condition, data) {
            Ok(true) => {}
            Ok(false) => {
                debug!(template = %template.name, "Skipping workload monitor, condition is false");
                return None;
            }
            Err(e) => {
                error!(template = %template.name, condition = %condition, error = %e, "Failed to evaluate condition");
                return None;
            }
        }
    }

    let name = match render(&template.name, data) {
        Ok(name) if !name.is_empty() => name,
        Ok(_) => return None,
        Err(e) => {
            error!(template = %template.name, error = %e, "Failed to render monitor name");
            return None;
        }
    };

    let mut selector = BTreeMap::new();
    for (key, value) in &template.selector {
        match render(value, data) {
            Ok(rendered) => {
                selector.insert(key.clone(), rendered);
            }
            Err(e) => {
                error!(key = %key, template = %value, error = %e, "Failed to render selector value");
            }
        }
    }

    let mut monitor = WorkloadMonitor::new(
        &name,
        WorkloadMonitorSpec {
            selector,
            kind: template.kind.clone(),
            r#type: template.r#type.clone(),
            version: release.chart_version().map(String::from),
            replicas: render_count(template.replicas.as_deref(), data, "replicas"),
            min_replicas: render_count(template.min_replicas.as_deref(), data, "minReplicas"),
        },
    );
    monitor.metadata = ObjectMeta {
        name: Some(name),
        namespace: release.namespace(),
        labels: Some(BTreeMap::from([
            (WORKLOAD_MONITOR_OWNED.to_string(), TRUE.to_string()),
            (WORKLOAD_MONITOR_RELEASE.to_string(), release.name_any()),
        ])),
        owner_references: owner_reference(release, true).map(|r| vec![r]),
        ..Default::default()
    };
    Some(monitor)
}

/// Monitors a release should have according to its definition.
#[must_use]
pub fn desired_monitors(release: &HelmRelease, definition: &ApplicationDefinition) -> Vec<WorkloadMonitor> {
    let data = template_data(release);
    definition
        .spec
        .workload_monitors
        .iter()
        .filter_map(|template| render_monitor(template, release, &data))
        .collect()
}

/// Label selector of the monitors produced for a release.
#[must_use]
pub fn owned_selector(release: &str) -> String {
    format!("{WORKLOAD_MONITOR_OWNED}={TRUE},{WORKLOAD_MONITOR_RELEASE}={release}")
}

async fn delete_unexpected(api: &Api<WorkloadMonitor>, release: &str, expected: &BTreeSet<String>) -> Result<()> {
    let owned = api
        .list(&ListParams::default().labels(&owned_selector(release)))
        .await
        .context("failed to list WorkloadMonitors")?;
    for monitor in owned {
        let name = monitor.name_any();
        if expected.contains(&name) {
            continue;
        }
        info!(name = %name, release = %release, "Deleting unexpected WorkloadMonitor");
        if let Err(e) = delete_if_exists(api, &name, "WorkloadMonitor").await {
            error!(name = %name, error = %e, "Failed to delete WorkloadMonitor");
        }
    }
    Ok(())
}

/// Reconciles the workload monitors of one release.
///
/// # Errors
///
/// Returns an error if owned monitors cannot be listed.
pub async fn reconcile_workload_monitors(
    ctx: Arc<Context>,
    release: Arc<HelmRelease>,
) -> Result<Action> {
    let name = release.name_any();
    let namespace = release.namespace().unwrap_or_default();
    if name.starts_with(&ctx.config.tenant_prefix) {
        return Ok(Action::await_change());
    }
    let Some(definition) = ctx.stores.definition_for_release(&release) else {
        debug!(release = %name, namespace = %namespace, "No ApplicationDefinition for release");
        return Ok(Action::await_change());
    };

    let api: Api<WorkloadMonitor> = Api::namespaced(ctx.client.clone(), &namespace);
    let mut expected = BTreeSet::new();
    for monitor in desired_monitors(&release, &definition) {
        let monitor_name = monitor.name_any();
        expected.insert(monitor_name.clone());
        let (spec, labels, owners) = (
            monitor.spec.clone(),
            monitor.metadata.labels.clone().unwrap_or_default(),
            monitor.metadata.owner_references.clone(),
        );
        let applied = create_or_update(&api, monitor, |m| {
            merge_into(&mut m.metadata.labels, &labels);
            m.metadata.owner_references = owners.clone();
            m.spec = spec.clone();
            Ok(())
        })
        .await;
        if let Err(e) = applied {
            error!(name = %monitor_name, release = %name, error = %e, "Failed to create or update WorkloadMonitor");
        }
    }

    delete_unexpected(&api, &name, &expected).await?;
    debug!(release = %name, monitors = expected.len(), "Reconciled workload monitors");
    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "workload_monitor_tests.rs"]
mod workload_monitor_tests;
