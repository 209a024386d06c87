// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dashboard.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{ApplicationDefinitionSpec, ApplicationSpec, DashboardSpec};

    const SCHEMA: &str = r#"{
        "type": "object",
        "properties": {
            "instanceType": {"type": "string", "default": "u1.medium"},
            "spec": {
                "type": "object",
                "properties": {
                    "version": {"type": "string", "enum": ["v16", "v17"]},
                    "description": {"type": "string"},
                    "replicas": {"type": "integer"},
                    "backup": {
                        "type": "object",
                        "properties": {"schedule": {"type": "string"}}
                    },
                    "users": {
                        "type": "array",
                        "items": {"type": "object", "properties": {"name": {"type": "string"}}}
                    }
                }
            }
        }
    }"#;

    fn definition(kind: &str, plural: &str) -> ApplicationDefinition {
        ApplicationDefinition::new(
            &kind.to_lowercase(),
            ApplicationDefinitionSpec {
                application: ApplicationSpec {
                    kind: kind.to_string(),
                    singular: kind.to_lowercase(),
                    plural: plural.to_string(),
                    open_api_schema: SCHEMA.to_string(),
                },
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_names_and_keys() {
        let def = definition("Postgres", "postgreses");
        assert_eq!(resource_path(&def), "/apps.cozystack.io/v1alpha1/postgreses");
        assert_eq!(customization_id(&def), "default-/apps.cozystack.io/v1alpha1/postgreses");
        assert_eq!(override_name(&def), "apps.cozystack.io.v1alpha1.postgreses");
        assert_eq!(
            navigation_key(&def),
            "base-factory-namespaced-api-apps.cozystack.io-v1alpha1-postgreses"
        );
        assert_eq!(details_factory(&def), "postgres-details");
    }

    #[test]
    fn test_multiline_schema() {
        let schema = multiline_schema(SCHEMA).unwrap();
        let spec = &schema["properties"]["spec"]["properties"];
        assert_eq!(spec["description"], json!({"type": "multilineString"}));
        assert!(spec.get("version").is_none());
        assert!(spec.get("replicas").is_none());
        assert_eq!(
            spec["backup"]["properties"]["schedule"]["type"],
            "multilineString"
        );
        assert_eq!(
            spec["users"]["items"]["properties"]["name"]["type"],
            "multilineString"
        );
    }

    #[test]
    fn test_multiline_schema_edge_inputs() {
        assert_eq!(multiline_schema("").unwrap(), json!({}));
        assert_eq!(multiline_schema(r#"{"properties": {}}"#).unwrap(), json!({}));
        assert!(multiline_schema("{not json").is_err());
    }

    #[test]
    fn test_hidden_paths() {
        let mut def = definition("Postgres", "postgreses");
        let hidden = hidden_paths(&def);
        assert!(hidden.contains(&vec!["metadata".to_string(), "uid".to_string()]));
        assert!(hidden.contains(&vec!["status".to_string()]));
        assert!(!hidden.contains(&vec!["metadata".to_string()]));

        def.spec.dashboard = Some(DashboardSpec {
            name: Some("etcd".into()),
            ..Default::default()
        });
        assert_eq!(hidden_paths(&def)[0], vec!["metadata".to_string()]);
    }

    #[test]
    fn test_override_spec() {
        let mut def = definition("Postgres", "postgreses");
        assert_eq!(custom_forms_override_spec(&def)["sort"], Value::Null);

        def.spec.dashboard = Some(DashboardSpec {
            keys_order: vec![vec!["spec".into(), "replicas".into()]],
            ..Default::default()
        });
        let spec = custom_forms_override_spec(&def);
        assert_eq!(spec["sort"], json!([["spec", "replicas"]]));
        assert_eq!(spec["strategy"], "merge");
        assert_eq!(spec["customizationId"], "default-/apps.cozystack.io/v1alpha1/postgreses");
    }

    #[test]
    fn test_vm_instance_dropdowns() {
        let spec = custom_forms_override_spec(&definition("VMInstance", "vminstances"));
        let props = &spec["schema"]["properties"]["spec"]["properties"];
        assert_eq!(props["instanceType"]["type"], "listInput");
        assert_eq!(props["instanceType"]["default"], "u1.medium");
        assert_eq!(props["disks"]["items"]["properties"]["name"]["type"], "listInput");
        assert_eq!(props["description"]["type"], "multilineString");

        let other = custom_forms_override_spec(&definition("Postgres", "postgreses"));
        assert!(other["schema"]["properties"]["spec"]["properties"]
            .get("instanceType")
            .is_none());
    }

    #[test]
    fn test_map_entry_preserves_others() {
        let current = json!({
            "mappings": {"/apps.cozystack.io/v1alpha1/redises": "default-/apps.cozystack.io/v1alpha1/redises", "bad": 1},
            "other": true
        });
        let updated = with_map_entry(Some(&current), "mappings", "/a/b/c", "default-/a/b/c");
        assert_eq!(updated["other"], true);
        assert_eq!(updated["mappings"]["/a/b/c"], "default-/a/b/c");
        assert_eq!(
            updated["mappings"]["/apps.cozystack.io/v1alpha1/redises"],
            "default-/apps.cozystack.io/v1alpha1/redises"
        );
        assert!(updated["mappings"].get("bad").is_none());

        assert_eq!(
            with_map_entry(None, "baseFactoriesMapping", "k", "v"),
            json!({"baseFactoriesMapping": {"k": "v"}})
        );
    }
}
