// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use kube::CustomResourceExt;
    use serde_json::json;

    #[test]
    fn test_package_source_deserializes_nested_variants() {
        let spec: PackageSourceSpec = serde_json::from_value(json!({
            "sourceRef": {"kind": "GitRepository", "name": "cozystack", "namespace": "cozy-system"},
            "variants": [{
                "name": "default",
                "dependsOn": ["cilium"],
                "libraries": [{"path": "library/cozy-lib"}],
                "components": [{
                    "name": "primary",
                    "path": "pg/primary",
                    "install": {"namespace": "tenant-a", "releaseName": "pg-0", "privileged": true},
                    "valuesFiles": ["values-ha.yaml"]
                }]
            }]
        }))
        .unwrap();

        let variant = &spec.variants[0];
        assert_eq!(variant.depends_on, vec!["cilium"]);
        assert!(variant.libraries[0].name.is_none());
        let install = variant.components[0].install.as_ref().unwrap();
        assert_eq!(install.release_name.as_deref(), Some("pg-0"));
        assert!(install.privileged);
        assert!(!install.disabled);
        assert!(install.depends_on.is_empty());
    }

    #[test]
    fn test_package_spec_defaults() {
        let spec: PackageSpec = serde_json::from_value(json!({})).unwrap();
        assert!(spec.variant.is_none());
        assert!(spec.ignore_dependencies.is_empty());
        assert!(spec.components.is_empty());
    }

    #[test]
    fn test_package_component_values_preserved() {
        let spec: PackageSpec = serde_json::from_value(json!({
            "components": {"primary": {"values": {"replicas": 3, "nested": {"a": "b"}}}}
        }))
        .unwrap();
        let values = spec.components["primary"].values.as_ref().unwrap();
        assert_eq!(values["nested"]["a"], "b");
    }

    #[test]
    fn test_bundle_deletion_policy_defaults_to_delete() {
        let spec: BundleSpec = serde_json::from_value(json!({
            "sourceRef": {"kind": "OCIRepository", "name": "src", "namespace": "cozy-system"},
            "packages": []
        }))
        .unwrap();
        assert_eq!(spec.deletion_policy, DeletionPolicy::Delete);

        let orphan: BundleSpec = serde_json::from_value(json!({
            "sourceRef": {"kind": "OCIRepository", "name": "src", "namespace": "cozy-system"},
            "deletionPolicy": "Orphan"
        }))
        .unwrap();
        assert_eq!(orphan.deletion_policy, DeletionPolicy::Orphan);
    }

    #[test]
    fn test_application_definition_plural_defaults() {
        let mut spec = ApplicationDefinitionSpec::default();
        spec.application.kind = "Postgres".into();
        assert_eq!(spec.plural(), "postgress");

        spec.application.plural = "postgreses".into();
        assert_eq!(spec.plural(), "postgreses");
    }

    #[test]
    fn test_application_definition_open_api_schema_field_name() {
        let spec: ApplicationDefinitionSpec = serde_json::from_value(json!({
            "application": {"kind": "Redis", "openAPISchema": "{\"type\":\"object\"}"},
            "release": {"prefix": "redis-", "chart": {"name": "redis", "sourceRef": {"kind": "HelmRepository", "name": "cozystack-apps", "namespace": "cozy-public"}}}
        }))
        .unwrap();
        assert_eq!(spec.application.open_api_schema, "{\"type\":\"object\"}");
        assert!(spec.matches_chart("redis"));
        assert!(!spec.matches_chart("postgres"));
    }

    #[test]
    fn test_condition_skips_empty_optionals() {
        let condition = Condition {
            r#type: "Ready".into(),
            status: "True".into(),
            ..Default::default()
        };
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value, json!({"type": "Ready", "status": "True"}));
    }

    #[test]
    fn test_crds_are_cluster_scoped() {
        assert_eq!(PackageSource::crd().spec.scope, "Cluster");
        assert_eq!(Package::crd().spec.scope, "Cluster");
        assert_eq!(Bundle::crd().spec.scope, "Cluster");
        assert_eq!(ApplicationDefinition::crd().spec.scope, "Cluster");
    }

    #[test]
    fn test_values_schema_preserves_unknown_fields() {
        let crd = serde_json::to_value(Platform::crd()).unwrap();
        let values = &crd["spec"]["versions"][0]["schema"]["openAPIV3Schema"]["properties"]["spec"]
            ["properties"]["values"];
        assert_eq!(values["x-kubernetes-preserve-unknown-fields"], json!(true));
    }

    #[test]
    fn test_short_names() {
        let pks = PackageSource::crd();
        assert_eq!(
            pks.spec.names.short_names,
            Some(vec!["pks".to_string()])
        );
        let appdef = ApplicationDefinition::crd();
        assert_eq!(
            appdef.spec.names.short_names,
            Some(vec!["appdef".to_string()])
        );
    }
}
