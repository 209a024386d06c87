// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::{
        ApplicationDefinition, ApplicationDefinitionSpec, ApplicationSpec, ChartRef, ReleaseChart,
        ReleaseSpec,
    };
    use crate::external::{
        CrossNamespaceSourceReference, HelmChartTemplate, HelmChartTemplateSpec, HelmRelease,
        HelmReleaseSpec,
    };
    use crate::lineage::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
    use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
    use std::collections::{BTreeMap, HashMap};

    #[derive(Default)]
    struct MemoryGraph {
        objects: HashMap<(String, String), DynamicObject>,
        releases: HashMap<String, HelmRelease>,
    }

    #[async_trait]
    impl ObjectGraph for MemoryGraph {
        async fn get_object(
            &self,
            _namespace: &str,
            _api_version: &str,
            kind: &str,
            name: &str,
        ) -> Result<Option<DynamicObject>> {
            Ok(self
                .objects
                .get(&(kind.to_string(), name.to_string()))
                .cloned())
        }

        async fn get_release(&self, _namespace: &str, name: &str) -> Result<Option<HelmRelease>> {
            Ok(self.releases.get(name).cloned())
        }
    }

    fn owner(api_version: &str, kind: &str, name: &str) -> OwnerReference {
        OwnerReference {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: format!("{name}-uid"),
            ..Default::default()
        }
    }

    fn object(
        kind: &str,
        name: &str,
        owners: Vec<OwnerReference>,
        labels: BTreeMap<String, String>,
    ) -> DynamicObject {
        let resource = ApiResource::from_gvk(&GroupVersionKind::gvk("apps", "v1", kind));
        let mut obj = DynamicObject::new(name, &resource).within("tenant-a-prod");
        obj.metadata.owner_references = Some(owners);
        obj.metadata.labels = Some(labels);
        obj
    }

    fn release(name: &str, labels: BTreeMap<String, String>) -> HelmRelease {
        HelmRelease {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("tenant-a-prod".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: HelmReleaseSpec {
                chart: Some(HelmChartTemplate {
                    spec: HelmChartTemplateSpec {
                        chart: "postgres".to_string(),
                        source_ref: CrossNamespaceSourceReference {
                            kind: "HelmRepository".to_string(),
                            name: "cozystack-apps".to_string(),
                            namespace: Some("cozy-public".to_string()),
                        },
                        ..Default::default()
                    },
                }),
                ..Default::default()
            },
            status: None,
        }
    }

    fn definition() -> ApplicationDefinition {
        ApplicationDefinition::new(
            "postgres",
            ApplicationDefinitionSpec {
                application: ApplicationSpec {
                    kind: "Postgres".to_string(),
                    ..Default::default()
                },
                release: ReleaseSpec {
                    prefix: "pg-".to_string(),
                    chart: Some(ReleaseChart {
                        name: "postgres".to_string(),
                        source_ref: ChartRef {
                            kind: "HelmRepository".to_string(),
                            name: "cozystack-apps".to_string(),
                            namespace: "cozy-public".to_string(),
                        },
                    }),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_parse_watch_list() {
        let gvks = parse_watch_list("v1/Pod, apps/v1/Deployment").unwrap();
        assert_eq!(gvks[0], GroupVersionKind::gvk("", "v1", "Pod"));
        assert_eq!(gvks[1], GroupVersionKind::gvk("apps", "v1", "Deployment"));
        assert_eq!(parse_watch_list(" "), Err(LineageError::EmptyWatchList));
        assert!(matches!(
            parse_watch_list("Pod"),
            Err(LineageError::InvalidWatchToken(_))
        ));
    }

    #[test]
    fn test_has_lineage_labels() {
        let identity = ApplicationIdentity {
            group: "apps.cozystack.io".into(),
            kind: "Postgres".into(),
            name: "0".into(),
        };
        assert!(has_lineage_labels(&identity.labels()));
        let mut partial = identity.labels();
        partial.remove("apps.cozystack.io/application.name");
        assert!(!has_lineage_labels(&partial));
    }

    #[test]
    fn test_identity_labels_are_truncated() {
        let identity = ApplicationIdentity {
            group: "g".repeat(70),
            kind: "Postgres".into(),
            name: "0".into(),
        };
        let labels = identity.labels();
        assert_eq!(labels["apps.cozystack.io/application.group"].len(), 63);
    }

    #[tokio::test]
    async fn test_registry_maps_chart_to_application() {
        let registry = ApplicationRegistry::new();
        assert!(registry.is_empty().await);
        registry.replace(&[definition()]).await;

        let identity = registry.resolve(&release("pg-0", BTreeMap::new())).await.unwrap();
        assert_eq!(
            identity,
            ApplicationIdentity {
                group: "apps.cozystack.io".into(),
                kind: "Postgres".into(),
                name: "0".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_registry_prefers_release_labels() {
        let registry = ApplicationRegistry::new();
        let labels = BTreeMap::from([
            ("apps.cozystack.io/application.group".to_string(), "apps.cozystack.io".to_string()),
            ("apps.cozystack.io/application.kind".to_string(), "Redis".to_string()),
            ("apps.cozystack.io/application.name".to_string(), "cache".to_string()),
        ]);
        let identity = registry.resolve(&release("redis-cache", labels)).await.unwrap();
        assert_eq!(identity.kind, "Redis");
        assert_eq!(identity.name, "cache");
    }

    #[tokio::test]
    async fn test_walk_pod_to_release() {
        let registry = ApplicationRegistry::new();
        registry.replace(&[definition()]).await;

        let helm_labels = BTreeMap::from([
            ("helm.toolkit.fluxcd.io/name".to_string(), "pg-0".to_string()),
            ("helm.toolkit.fluxcd.io/namespace".to_string(), "tenant-a-prod".to_string()),
        ]);

        let mut graph = MemoryGraph::default();
        graph.objects.insert(
            ("ReplicaSet".into(), "pg-0-abc".into()),
            object(
                "ReplicaSet",
                "pg-0-abc",
                vec![owner("apps/v1", "Deployment", "pg-0")],
                BTreeMap::new(),
            ),
        );
        graph.objects.insert(
            ("Deployment".into(), "pg-0".into()),
            object("Deployment", "pg-0", vec![], helm_labels),
        );
        graph
            .releases
            .insert("pg-0".into(), release("pg-0", BTreeMap::new()));

        let pod = object(
            "Pod",
            "pg-0-abc-xyz",
            vec![owner("apps/v1", "ReplicaSet", "pg-0-abc")],
            BTreeMap::new(),
        );

        let found = find_applications(&graph, &registry, &pod).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "Postgres");
        assert_eq!(found[0].name, "0");
    }

    #[tokio::test]
    async fn test_walk_direct_release_owner() {
        let registry = ApplicationRegistry::new();
        registry.replace(&[definition()]).await;
        let mut graph = MemoryGraph::default();
        graph
            .releases
            .insert("pg-1".into(), release("pg-1", BTreeMap::new()));

        let secret = object(
            "Secret",
            "pg-1-credentials",
            vec![owner("helm.toolkit.fluxcd.io/v2", "HelmRelease", "pg-1")],
            BTreeMap::new(),
        );
        let found = find_applications(&graph, &registry, &secret).await.unwrap();
        assert_eq!(found[0].name, "1");
    }

    #[tokio::test]
    async fn test_walk_without_ancestors() {
        let registry = ApplicationRegistry::new();
        let graph = MemoryGraph::default();
        let orphan = object("Pod", "lonely", vec![], BTreeMap::new());
        assert!(find_applications(&graph, &registry, &orphan)
            .await
            .unwrap()
            .is_empty());
    }
}
