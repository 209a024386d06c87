// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Aligns UI-managed releases with their `ApplicationDefinition`.
//!
//! Triggered by definition changes only. Releases are not watched here: the
//! release engine writes them constantly and a watch would churn.

use crate::constants::{APPLICATION_API_GROUP, KIND_HELM_RELEASE, VALUES_SECRET_NAME};
use crate::context::Context;
use crate::crd::{ApplicationDefinition, ChartRef, ReleaseChart};
use crate::external::{
    CrossNamespaceSourceReference, HelmChartTemplate, HelmChartTemplateSpec, HelmRelease,
    ValuesReference,
};
use crate::labels::{APPLICATION_GROUP, APPLICATION_KIND, TRUE, UI};
use crate::metrics::record_resource_updated;
use crate::values::{namespace_values, sync_namespace_values};
use anyhow::{Context as _, Result};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ListParams, PostParams};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// `valuesFrom` every UI release carries.
#[must_use]
pub fn expected_values_from() -> Vec<ValuesReference> {
    vec![ValuesReference {
        kind: "Secret".to_string(),
        name: VALUES_SECRET_NAME.to_string(),
        ..Default::default()
    }]
}

/// Label selector for the releases of a definition's kind.
#[must_use]
pub fn release_selector(definition: &ApplicationDefinition) -> String {
    format!(
        "{APPLICATION_KIND}={},{APPLICATION_GROUP}={APPLICATION_API_GROUP},{UI}={TRUE}",
        definition.spec.application.kind
    )
}

/// The definition's chart reference when every field is set.
#[must_use]
pub fn complete_chart_ref(definition: &ApplicationDefinition) -> Option<&ChartRef> {
    definition
        .spec
        .release
        .chart_ref
        .as_ref()
        .filter(|r| !r.kind.is_empty() && !r.name.is_empty() && !r.namespace.is_empty())
}

/// The definition's inline chart when its name and source kind and name are set.
/// Takes precedence over the chart reference.
#[must_use]
pub fn complete_chart(definition: &ApplicationDefinition) -> Option<&ReleaseChart> {
    definition
        .spec
        .release
        .chart
        .as_ref()
        .filter(|c| !c.name.is_empty() && !c.source_ref.kind.is_empty() && !c.source_ref.name.is_empty())
}

fn source_reference(reference: &ChartRef) -> CrossNamespaceSourceReference {
    CrossNamespaceSourceReference {
        kind: reference.kind.clone(),
        name: reference.name.clone(),
        namespace: Some(reference.namespace.clone()).filter(|ns| !ns.is_empty()),
    }
}

/// Brings `release` in line with `definition`. Returns whether anything changed.
///
/// `namespace_labels` are the labels of the release's namespace; when given,
/// the reserved `_namespace` values key is synced from them.
///
/// Definition labels override release labels with the same key.
pub fn align_release(
    release: &mut HelmRelease,
    definition: &ApplicationDefinition,
    namespace_labels: Option<&BTreeMap<String, String>>,
) -> bool {
    let mut changed = false;

    if let Some(chart) = complete_chart(definition) {
        let desired = source_reference(&chart.source_ref);
        match release.spec.chart.as_mut() {
            None => {
                release.spec.chart = Some(HelmChartTemplate {
                    spec: HelmChartTemplateSpec {
                        chart: chart.name.clone(),
                        source_ref: desired,
                        ..Default::default()
                    },
                });
                changed = true;
            }
            Some(current) if current.spec.chart != chart.name || current.spec.source_ref != desired => {
                current.spec.chart = chart.name.clone();
                current.spec.source_ref = desired;
                changed = true;
            }
            Some(_) => {}
        }
        if release.spec.chart_ref.take().is_some() {
            changed = true;
        }
    } else if let Some(expected) = complete_chart_ref(definition) {
        let desired = source_reference(expected);
        if release.spec.chart_ref.as_ref() != Some(&desired) {
            release.spec.chart_ref = Some(desired);
            changed = true;
        }
        if release.spec.chart.take().is_some() {
            changed = true;
        }
    }

    let expected = expected_values_from();
    if release.spec.values_from != expected {
        release.spec.values_from = expected;
        changed = true;
    }

    if !definition.spec.release.labels.is_empty() {
        let labels = release.metadata.labels.get_or_insert_with(BTreeMap::new);
        for (key, value) in &definition.spec.release.labels {
            if labels.get(key) != Some(value) {
                labels.insert(key.clone(), value.clone());
                changed = true;
            }
        }
    }

    if let Some(namespace_labels) = namespace_labels {
        if let Some(values) =
            sync_namespace_values(release.spec.values.as_ref(), &namespace_values(namespace_labels))
        {
            release.spec.values = Some(values);
            changed = true;
        }
    }

    changed
}

/// Reconciles the releases of one `ApplicationDefinition`.
///
/// # Errors
///
/// Returns an error if releases cannot be listed. Per-release failures are
/// logged and skipped.
pub async fn reconcile_application_definition(
    ctx: Arc<Context>,
    definition: Arc<ApplicationDefinition>,
) -> Result<Action> {
    let name = definition.name_any();
    if definition.spec.application.kind.is_empty() {
        debug!(definition = %name, "Skipping release alignment: application kind is empty");
        return Ok(Action::await_change());
    }
    if complete_chart(&definition).is_none() && complete_chart_ref(&definition).is_none() {
        error!(definition = %name, "Skipping chart alignment: chart and chartRef are nil or incomplete");
    }

    let releases: Api<HelmRelease> = Api::all(ctx.client.clone());
    let list = releases
        .list(&ListParams::default().labels(&release_selector(&definition)))
        .await
        .context("failed to list releases")?;
    debug!(definition = %name, count = list.items.len(), "Found releases to align");

    let namespaces: Api<Namespace> = Api::all(ctx.client.clone());
    let mut namespace_cache: BTreeMap<String, Option<BTreeMap<String, String>>> = BTreeMap::new();

    for mut release in list {
        let namespace = release.namespace().unwrap_or_default();
        if !namespace_cache.contains_key(&namespace) {
            let labels = match namespaces.get_opt(&namespace).await {
                Ok(found) => found.map(|ns| ns.labels().clone()),
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "Failed to read namespace labels");
                    None
                }
            };
            namespace_cache.insert(namespace.clone(), labels);
        }
        let namespace_labels = namespace_cache.get(&namespace).and_then(Option::as_ref);

        if !align_release(&mut release, &definition, namespace_labels) {
            continue;
        }
        let api: Api<HelmRelease> = Api::namespaced(ctx.client.clone(), &namespace);
        match api
            .replace(&release.name_any(), &PostParams::default(), &release)
            .await
        {
            Ok(_) => {
                debug!(name = %release.name_any(), namespace = %namespace, "Aligned release");
                record_resource_updated(KIND_HELM_RELEASE);
            }
            Err(e) => {
                error!(name = %release.name_any(), namespace = %namespace, error = %e, "Failed to update release");
            }
        }
    }

    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "appdef_release_tests.rs"]
mod appdef_release_tests;
