// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dashboard access to an application's subresources.
//!
//! For every managed release that belongs to an `ApplicationDefinition`, a `Role`
//! grants read access to the secrets, services and ingresses the definition
//! selects (plus the release's workload monitor), and a `RoleBinding` hands that
//! role to the tenant and every ancestor tenant. Both are owned by the release.

use crate::constants::API_GROUP;
use crate::context::Context;
use crate::crd::{ApplicationDefinition, ResourceSelector};
use crate::external::HelmRelease;
use crate::labels::{DASHBOARD_RESOURCES_OWNED, DASHBOARD_RESOURCES_RELEASE, TRUE};
use crate::naming::tenant_ancestors;
use crate::reconcilers::resources::{create_or_update, delete_if_exists, merge_into, owner_reference};
use crate::template::{render, TemplateError};
use anyhow::{Context as _, Result};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error};

/// Suffix of the role and binding names.
pub const DASHBOARD_RESOURCES_SUFFIX: &str = "-dashboard-resources";

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
const READ_VERBS: [&str; 3] = ["get", "list", "watch"];
const ACCESS_LEVELS: [&str; 3] = ["use", "admin", "super-admin"];

/// Name of the role and binding of a release.
#[must_use]
pub fn dashboard_resources_name(release: &str) -> String {
    format!("{release}{DASHBOARD_RESOURCES_SUFFIX}")
}

/// Whether the definition selects any subresource at all.
#[must_use]
pub fn has_includes(definition: &ApplicationDefinition) -> bool {
    let spec = &definition.spec;
    !spec.secrets.include.is_empty()
        || !spec.services.include.is_empty()
        || !spec.ingresses.include.is_empty()
}

/// Template data for resource-name templates.
#[must_use]
pub fn template_data(release: &HelmRelease, definition: &ApplicationDefinition) -> Value {
    let name = release.name_any();
    json!({
        "name": name.strip_prefix(&definition.spec.release.prefix).unwrap_or(&name),
        "kind": definition.spec.application.kind.to_lowercase(),
        "namespace": release.namespace().unwrap_or_default(),
    })
}

/// Renders the resource names of `selectors`, deduplicated in first-seen order.
///
/// # Errors
///
/// Returns the first template error.
pub fn render_resource_names(
    selectors: &[ResourceSelector],
    data: &Value,
) -> std::result::Result<Vec<String>, TemplateError> {
    let mut seen = BTreeSet::new();
    let mut names = Vec::new();
    for template in selectors.iter().flat_map(|s| &s.resource_names) {
        let rendered = render(template, data)?;
        if seen.insert(rendered.clone()) {
            names.push(rendered);
        }
    }
    Ok(names)
}

fn read_rule(api_group: &str, resource: &str, names: Vec<String>) -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![api_group.to_string()]),
        resources: Some(vec![resource.to_string()]),
        resource_names: Some(names),
        verbs: READ_VERBS.iter().map(ToString::to_string).collect(),
        ..Default::default()
    }
}

/// Policy rules of a release's dashboard role.
///
/// A selector group whose templates fail to render is skipped with an error
/// log; the workload-monitor rule is always present.
#[must_use]
pub fn build_rules(release: &HelmRelease, definition: &ApplicationDefinition) -> Vec<PolicyRule> {
    let data = template_data(release, definition);
    let spec = &definition.spec;
    let groups = [
        ("", "secrets", &spec.secrets.include),
        ("", "services", &spec.services.include),
        ("networking.k8s.io", "ingresses", &spec.ingresses.include),
    ];

    let mut rules = Vec::new();
    for (api_group, resource, selectors) in groups {
        match render_resource_names(selectors, &data) {
            Ok(names) if !names.is_empty() => rules.push(read_rule(api_group, resource, names)),
            Ok(_) => {}
            Err(e) => {
                error!(release = %release.name_any(), resource = %resource, error = %e, "Failed to render resource names");
            }
        }
    }
    rules.push(read_rule(
        API_GROUP,
        "workloadmonitors",
        vec![release.name_any()],
    ));
    rules
}

/// Subjects for a namespace: each tenant from the namespace up to the root gets
/// its service account and one group per access level.
#[must_use]
pub fn build_subjects(namespace: &str, tenant_prefix: &str) -> Vec<Subject> {
    tenant_ancestors(namespace, tenant_prefix)
        .into_iter()
        .flat_map(|tenant| {
            let mut subjects = vec![Subject {
                kind: "ServiceAccount".to_string(),
                name: tenant.clone(),
                namespace: Some(tenant.clone()),
                ..Default::default()
            }];
            subjects.extend(ACCESS_LEVELS.iter().map(|level| Subject {
                kind: "Group".to_string(),
                name: format!("{tenant}-{level}"),
                api_group: Some(RBAC_API_GROUP.to_string()),
                ..Default::default()
            }));
            subjects
        })
        .collect()
}

fn metadata(release: &HelmRelease) -> ObjectMeta {
    let name = release.name_any();
    ObjectMeta {
        name: Some(dashboard_resources_name(&name)),
        namespace: release.namespace(),
        labels: Some(BTreeMap::from([
            (DASHBOARD_RESOURCES_OWNED.to_string(), TRUE.to_string()),
            (DASHBOARD_RESOURCES_RELEASE.to_string(), name),
        ])),
        owner_references: owner_reference(release, true).map(|r| vec![r]),
        ..Default::default()
    }
}

/// Dashboard role of a release.
#[must_use]
pub fn build_role(release: &HelmRelease, definition: &ApplicationDefinition) -> Role {
    Role {
        metadata: metadata(release),
        rules: Some(build_rules(release, definition)),
    }
}

/// Binding of the dashboard role to the namespace's tenants.
#[must_use]
pub fn build_role_binding(release: &HelmRelease, tenant_prefix: &str) -> RoleBinding {
    let namespace = release.namespace().unwrap_or_default();
    RoleBinding {
        metadata: metadata(release),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name: dashboard_resources_name(&release.name_any()),
        },
        subjects: Some(build_subjects(&namespace, tenant_prefix)),
    }
}

/// Reconciles the dashboard RBAC of one release.
///
/// # Errors
///
/// Returns an error if the role or binding cannot be written or deleted.
pub async fn reconcile_subresource_rbac(
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

    let roles: Api<Role> = Api::namespaced(ctx.client.clone(), &namespace);
    let bindings: Api<RoleBinding> = Api::namespaced(ctx.client.clone(), &namespace);
    let rbac_name = dashboard_resources_name(&name);

    if !has_includes(&definition) {
        delete_if_exists(&roles, &rbac_name, "Role").await?;
        delete_if_exists(&bindings, &rbac_name, "RoleBinding").await?;
        return Ok(Action::await_change());
    }

    let role = build_role(&release, &definition);
    let (rules, labels, owners) = (
        role.rules.clone(),
        role.metadata.labels.clone().unwrap_or_default(),
        role.metadata.owner_references.clone(),
    );
    create_or_update(&roles, role, |r| {
        merge_into(&mut r.metadata.labels, &labels);
        r.metadata.owner_references = owners.clone();
        r.rules = rules.clone();
        Ok(())
    })
    .await
    .context("failed to create or update Role")?;

    let binding = build_role_binding(&release, &ctx.config.tenant_prefix);
    let (subjects, role_ref, labels, owners) = (
        binding.subjects.clone(),
        binding.role_ref.clone(),
        binding.metadata.labels.clone().unwrap_or_default(),
        binding.metadata.owner_references.clone(),
    );
    create_or_update(&bindings, binding, |b| {
        merge_into(&mut b.metadata.labels, &labels);
        b.metadata.owner_references = owners.clone();
        b.subjects = subjects.clone();
        b.role_ref = role_ref.clone();
        Ok(())
    })
    .await
    .context("failed to create or update RoleBinding")?;

    debug!(release = %name, namespace = %namespace, "Reconciled dashboard resources");
    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "subresource_rbac_tests.rs"]
mod subresource_rbac_tests;
