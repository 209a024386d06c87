// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dashboard customization for `ApplicationDefinition`s.
//!
//! Each definition gets a `CustomFormsOverride` describing its form, an entry in
//! the global `CFOMapping` routing its resource path to that override, and an
//! entry in the global `Navigation` pointing its base factory at the kind's
//! details factory. The two global records are shared by every definition, so
//! only this definition's key is ever written into them.

use crate::constants::{APPLICATION_API_GROUP, APPLICATION_API_VERSION};
use crate::context::Context;
use crate::crd::ApplicationDefinition;
use crate::external::{cfo_mapping_resource, custom_forms_override_resource, navigation_resource};
use crate::reconcilers::resources::{create_or_update, owner_reference};
use anyhow::{Context as _, Result};
use kube::api::{ApiResource, DynamicObject};
use kube::runtime::controller::Action;
use kube::{Api, ResourceExt};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the singleton `CFOMapping`.
pub const CFO_MAPPING_NAME: &str = "cfomapping";

/// Name of the singleton `Navigation`.
pub const NAVIGATION_NAME: &str = "navigation";

/// Kind whose form gets API-backed dropdowns for instance types and disks.
const VM_INSTANCE_KIND: &str = "VMInstance";

const SYSTEM_METADATA_FIELDS: &[&str] = &[
    "creationTimestamp",
    "deletionGracePeriodSeconds",
    "deletionTimestamp",
    "finalizers",
    "generateName",
    "generation",
    "managedFields",
    "ownerReferences",
    "resourceVersion",
    "selfLink",
    "uid",
];

/// Canonical resource path of a definition's kind: `/{group}/{version}/{plural}`.
#[must_use]
pub fn resource_path(definition: &ApplicationDefinition) -> String {
    format!(
        "/{APPLICATION_API_GROUP}/{APPLICATION_API_VERSION}/{}",
        definition.spec.plural()
    )
}

/// Identifier of the form customization for a definition.
#[must_use]
pub fn customization_id(definition: &ApplicationDefinition) -> String {
    format!("default-{}", resource_path(definition))
}

/// Name of the definition's `CustomFormsOverride`: `{group}.{version}.{plural}`.
#[must_use]
pub fn override_name(definition: &ApplicationDefinition) -> String {
    format!(
        "{APPLICATION_API_GROUP}.{APPLICATION_API_VERSION}.{}",
        definition.spec.plural()
    )
}

/// Navigation key of the definition's base factory.
#[must_use]
pub fn navigation_key(definition: &ApplicationDefinition) -> String {
    format!(
        "base-factory-namespaced-api-{APPLICATION_API_GROUP}-{APPLICATION_API_VERSION}-{}",
        definition.spec.plural()
    )
}

/// Details factory of the definition's kind.
#[must_use]
pub fn details_factory(definition: &ApplicationDefinition) -> String {
    format!("{}-details", definition.spec.application.kind.to_lowercase())
}

/// Form paths hidden from the user.
///
/// System metadata, API type fields and status are always hidden. A definition
/// with a fixed instance name hides all of `metadata`.
#[must_use]
pub fn hidden_paths(definition: &ApplicationDefinition) -> Vec<Vec<String>> {
    let mut hidden = Vec::new();
    let fixed_name = definition
        .spec
        .dashboard
        .as_ref()
        .and_then(|d| d.name.as_deref())
        .is_some_and(|name| !name.trim().is_empty());
    if fixed_name {
        hidden.push(vec!["metadata".to_string()]);
    }
    hidden.extend(
        SYSTEM_METADATA_FIELDS
            .iter()
            .map(|field| vec!["metadata".to_string(), (*field).to_string()]),
    );
    hidden.push(vec!["apiVersion".to_string()]);
    hidden.push(vec!["kind".to_string()]);
    hidden.push(vec!["status".to_string()]);
    hidden
}

fn multiline_properties(source: &Map<String, Value>) -> Map<String, Value> {
    let mut target = Map::new();
    for (name, property) in source {
        let Some(property) = property.as_object() else {
            continue;
        };
        match property.get("type").and_then(Value::as_str) {
            Some("string") if !property.contains_key("enum") => {
                target.insert(name.clone(), json!({"type": "multilineString"}));
            }
            Some("object") => {
                if let Some(children) = property.get("properties").and_then(Value::as_object) {
                    target.insert(
                        name.clone(),
                        json!({"properties": multiline_properties(children)}),
                    );
                }
            }
            Some("array") => {
                if let Some(children) = property
                    .get("items")
                    .and_then(|items| items.get("properties"))
                    .and_then(Value::as_object)
                {
                    target.insert(
                        name.clone(),
                        json!({"items": {"properties": multiline_properties(children)}}),
                    );
                }
            }
            _ => {}
        }
    }
    target
}

/// Form schema derived from an OpenAPI schema: every string under `spec`
/// without an `enum` becomes a `multilineString`.
///
/// # Errors
///
/// Returns an error if the schema is not valid JSON.
pub fn multiline_schema(open_api_schema: &str) -> Result<Value, serde_json::Error> {
    if open_api_schema.trim().is_empty() {
        return Ok(json!({}));
    }
    let root: Value = serde_json::from_str(open_api_schema)?;
    let Some(spec_properties) = root
        .get("properties")
        .and_then(|p| p.get("spec"))
        .and_then(|s| s.get("properties"))
        .and_then(Value::as_object)
    else {
        return Ok(json!({}));
    };

    Ok(json!({
        "properties": {
            "spec": {"properties": multiline_properties(spec_properties)}
        }
    }))
}

fn list_input(value_uri: &str) -> Map<String, Value> {
    let mut field = Map::new();
    field.insert("type".into(), json!("listInput"));
    field.insert(
        "customProps".into(),
        json!({
            "valueUri": value_uri,
            "keysToValue": ["metadata", "name"],
            "keysToLabel": ["metadata", "name"],
        }),
    );
    field
}

/// Injects API-backed dropdowns for kinds that need them.
///
/// `open_api_properties` are the top-level properties of the definition's
/// schema; a declared `instanceType` default is carried into the dropdown.
pub fn apply_list_input_overrides(
    schema: &mut Value,
    kind: &str,
    open_api_properties: Option<&Map<String, Value>>,
) {
    if kind != VM_INSTANCE_KIND {
        return;
    }
    if !schema.is_object() {
        *schema = json!({});
    }
    let spec = &mut schema["properties"]["spec"]["properties"];

    let mut instance_type = list_input(
        "/api/clusters/{cluster}/k8s/apis/instancetype.kubevirt.io/v1beta1/virtualmachineclusterinstancetypes",
    );
    if let Some(default) = open_api_properties
        .and_then(|props| props.get("instanceType"))
        .and_then(|prop| prop.get("default"))
    {
        instance_type.insert("default".into(), default.clone());
    }
    spec["instanceType"] = Value::Object(instance_type);
    spec["disks"]["items"]["properties"]["name"] = Value::Object(list_input(
        "/api/clusters/{cluster}/k8s/apis/apps.cozystack.io/v1alpha1/namespaces/{namespace}/vmdisks",
    ));
}

fn open_api_properties(open_api_schema: &str) -> Option<Map<String, Value>> {
    let root: Value = serde_json::from_str(open_api_schema).ok()?;
    root.get("properties").and_then(Value::as_object).cloned()
}

/// Spec of the definition's `CustomFormsOverride`.
#[must_use]
pub fn custom_forms_override_spec(definition: &ApplicationDefinition) -> Value {
    let open_api = &definition.spec.application.open_api_schema;
    let mut schema = multiline_schema(open_api).unwrap_or_else(|e| {
        warn!(definition = %definition.name_any(), error = %e, "Failed to parse openAPISchema, using empty form schema");
        json!({})
    });
    apply_list_input_overrides(
        &mut schema,
        &definition.spec.application.kind,
        open_api_properties(open_api).as_ref(),
    );

    let sort = definition
        .spec
        .dashboard
        .as_ref()
        .filter(|d| !d.keys_order.is_empty())
        .map(|d| json!(d.keys_order))
        .unwrap_or(Value::Null);

    json!({
        "customizationId": customization_id(definition),
        "hidden": hidden_paths(definition),
        "sort": sort,
        "schema": schema,
        "strategy": "merge",
    })
}

/// Returns `spec` with `map_key.entry = value` set, keeping other entries.
///
/// Non-string entries of the map are dropped, as are malformed maps.
#[must_use]
pub fn with_map_entry(spec: Option<&Value>, map_key: &str, entry: &str, value: &str) -> Value {
    let mut root = match spec {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    let mut entries: Map<String, Value> = root
        .get(map_key)
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter(|(_, v)| v.is_string())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();
    entries.insert(entry.to_string(), json!(value));
    root.insert(map_key.to_string(), Value::Object(entries));
    Value::Object(root)
}

async fn update_spec<F>(
    ctx: &Context,
    resource: &ApiResource,
    name: &str,
    definition: &ApplicationDefinition,
    owned: bool,
    build: F,
) -> Result<()>
where
    F: Fn(Option<&Value>) -> Value,
{
    let api: Api<DynamicObject> = Api::all_with(ctx.client.clone(), resource);
    let mut template = DynamicObject::new(name, resource);
    if owned {
        template.metadata.owner_references = owner_reference(definition, false).map(|r| vec![r]);
    }
    create_or_update(&api, template, |obj| {
        let spec = build(obj.data.get("spec"));
        if let Value::Object(data) = &mut obj.data {
            data.insert("spec".into(), spec);
        } else {
            obj.data = json!({ "spec": spec });
        }
        Ok(())
    })
    .await
    .with_context(|| format!("failed to update {} {name}", resource.kind))?;
    Ok(())
}

/// Reconciles the dashboard records of one `ApplicationDefinition`.
///
/// # Errors
///
/// Returns an error if any of the three records cannot be written.
pub async fn reconcile_dashboard(
    ctx: Arc<Context>,
    definition: Arc<ApplicationDefinition>,
) -> Result<Action> {
    if definition.spec.application.kind.is_empty() {
        debug!(definition = %definition.name_any(), "Skipping dashboard: application kind is empty");
        return Ok(Action::await_change());
    }

    let spec = custom_forms_override_spec(&definition);
    update_spec(
        &ctx,
        &custom_forms_override_resource(),
        &override_name(&definition),
        &definition,
        true,
        |_| spec.clone(),
    )
    .await?;

    let path = resource_path(&definition);
    let id = customization_id(&definition);
    update_spec(&ctx, &cfo_mapping_resource(), CFO_MAPPING_NAME, &definition, false, |current| {
        with_map_entry(current, "mappings", &path, &id)
    })
    .await?;

    let key = navigation_key(&definition);
    let factory = details_factory(&definition);
    update_spec(&ctx, &navigation_resource(), NAVIGATION_NAME, &definition, false, |current| {
        with_map_entry(current, "baseFactoriesMapping", &key, &factory)
    })
    .await?;

    debug!(definition = %definition.name_any(), path = %path, "Reconciled dashboard customization");
    Ok(Action::await_change())
}

#[cfg(test)]
#[path = "dashboard_tests.rs"]
mod dashboard_tests;
