// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `subresource_rbac.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{ApplicationDefinitionSpec, ApplicationSpec, ReleaseSpec, ResourceSelectors};
    use crate::external::HelmReleaseSpec;

    fn selectors(names: &[&str]) -> ResourceSelectors {
        ResourceSelectors {
            include: vec![ResourceSelector {
                resource_names: names.iter().map(ToString::to_string).collect(),
                ..Default::default()
            }],
            exclude: Vec::new(),
        }
    }

    fn definition() -> ApplicationDefinition {
        ApplicationDefinition::new(
            "postgres",
            ApplicationDefinitionSpec {
                application: ApplicationSpec {
                    kind: "Postgres".into(),
                    ..Default::default()
                },
                release: ReleaseSpec {
                    prefix: "postgres-".into(),
                    ..Default::default()
                },
                secrets: selectors(&["{{ .name }}-credentials", "{{ .kind }}-{{ .name }}-ca", "{{ .name }}-credentials"]),
                services: selectors(&["{{ .name }}-rw", "static-svc"]),
                ..Default::default()
            },
        )
    }

    fn release() -> HelmRelease {
        let mut hr = HelmRelease::new("postgres-db1", HelmReleaseSpec::default());
        hr.metadata.namespace = Some("tenant-a-prod".into());
        hr.metadata.uid = Some("hr-uid".into());
        hr
    }

    #[test]
    fn test_template_data() {
        assert_eq!(
            template_data(&release(), &definition()),
            json!({"name": "db1", "kind": "postgres", "namespace": "tenant-a-prod"})
        );
    }

    #[test]
    fn test_rules() {
        let rules = build_rules(&release(), &definition());
        assert_eq!(rules.len(), 3);

        assert_eq!(rules[0].resources.as_deref(), Some(&["secrets".to_string()][..]));
        assert_eq!(
            rules[0].resource_names.as_deref(),
            Some(&["db1-credentials".to_string(), "postgres-db1-ca".to_string()][..])
        );
        assert_eq!(
            rules[1].resource_names.as_deref(),
            Some(&["db1-rw".to_string(), "static-svc".to_string()][..])
        );

        let monitor = &rules[2];
        assert_eq!(monitor.api_groups.as_deref(), Some(&["cozystack.io".to_string()][..]));
        assert_eq!(monitor.resources.as_deref(), Some(&["workloadmonitors".to_string()][..]));
        assert_eq!(monitor.resource_names.as_deref(), Some(&["postgres-db1".to_string()][..]));
        assert_eq!(monitor.verbs, vec!["get", "list", "watch"]);
    }

    #[test]
    fn test_broken_template_skips_group() {
        let mut def = definition();
        def.spec.ingresses = selectors(&["{{ .name"]);
        let rules = build_rules(&release(), &def);
        assert!(rules
            .iter()
            .all(|r| r.resources.as_deref() != Some(&["ingresses".to_string()][..])));
    }

    #[test]
    fn test_subjects_cover_ancestors() {
        let subjects = build_subjects("tenant-a-prod", "tenant-");
        let names: Vec<&str> = subjects.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "tenant-a", "tenant-a-use", "tenant-a-admin", "tenant-a-super-admin",
                "tenant-a-prod", "tenant-a-prod-use", "tenant-a-prod-admin", "tenant-a-prod-super-admin",
                "tenant-root", "tenant-root-use", "tenant-root-admin", "tenant-root-super-admin",
            ]
        );
        assert_eq!(subjects[0].kind, "ServiceAccount");
        assert_eq!(subjects[0].namespace.as_deref(), Some("tenant-a"));
        assert_eq!(subjects[1].api_group.as_deref(), Some("rbac.authorization.k8s.io"));

        assert!(build_subjects("cozy-system", "tenant-").is_empty());
    }

    #[test]
    fn test_role_and_binding_metadata() {
        let role = build_role(&release(), &definition());
        assert_eq!(role.name_any(), "postgres-db1-dashboard-resources");
        assert_eq!(role.labels()["dashboardresources.cozystack.io/owned-by-crd"], "true");
        assert_eq!(role.labels()["dashboardresources.cozystack.io/helm-release"], "postgres-db1");
        assert_eq!(role.owner_references()[0].controller, Some(true));

        let binding = build_role_binding(&release(), "tenant-");
        assert_eq!(binding.role_ref.name, "postgres-db1-dashboard-resources");
        assert_eq!(binding.role_ref.kind, "Role");
    }

    #[test]
    fn test_has_includes() {
        assert!(has_includes(&definition()));
        let mut def = definition();
        def.spec.secrets = ResourceSelectors::default();
        def.spec.services = ResourceSelectors::default();
        assert!(!has_includes(&def));
    }
}
