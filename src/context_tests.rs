// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for context.rs

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{ApplicationDefinitionSpec, ChartRef, ReleaseChart, ReleaseSpec};
    use crate::external::{
        CrossNamespaceSourceReference, HelmChartTemplate, HelmChartTemplateSpec, HelmReleaseSpec,
    };
    use kube::runtime::reflector::store::Writer;
    use kube::runtime::watcher;

    fn definition(name: &str, prefix: &str, chart: &str) -> ApplicationDefinition {
        ApplicationDefinition::new(
            name,
            ApplicationDefinitionSpec {
                release: ReleaseSpec {
                    prefix: prefix.to_string(),
                    chart: Some(ReleaseChart {
                        name: chart.to_string(),
                        source_ref: ChartRef::default(),
                    }),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
    }

    fn release(name: &str, chart: &str) -> HelmRelease {
        HelmRelease::new(
            name,
            HelmReleaseSpec {
                chart: Some(HelmChartTemplate {
                    spec: HelmChartTemplateSpec {
                        chart: chart.to_string(),
                        ..Default::default()
                    },
                }),
                ..Default::default()
            },
        )
    }

    fn stores(definitions: Vec<ApplicationDefinition>) -> Stores {
        let mut writer: Writer<ApplicationDefinition> = Writer::default();
        for d in definitions {
            writer.apply_watcher_event(&watcher::Event::Apply(d));
        }
        Stores {
            application_definitions: writer.as_reader(),
            packages: Writer::default().as_reader(),
            package_sources: Writer::default().as_reader(),
        }
    }

    #[test]
    fn test_definition_matches_release_by_chart_and_prefix() {
        let def = definition("postgres", "postgres-", "postgres");
        assert!(definition_matches_release(&def, &release("postgres-db", "postgres")));
        assert!(!definition_matches_release(&def, &release("db", "postgres")));
        assert!(!definition_matches_release(&def, &release("postgres-db", "mysql")));
    }

    #[test]
    fn test_definition_matches_chart_ref_release() {
        let mut def = definition("vm", "vm-", "unused");
        def.spec.release.chart = None;
        def.spec.release.chart_ref = Some(ChartRef {
            kind: "ExternalArtifact".into(),
            name: "cozystack-apps-vm".into(),
            namespace: "cozy-public".into(),
        });
        let mut hr = release("vm-a", "ignored");
        hr.spec.chart = None;
        hr.spec.chart_ref = Some(CrossNamespaceSourceReference {
            kind: "ExternalArtifact".into(),
            name: "cozystack-apps-vm".into(),
            namespace: Some("cozy-public".into()),
        });
        assert!(definition_matches_release(&def, &hr));
    }

    #[test]
    fn test_definition_for_release_prefers_longest_prefix() {
        let stores = stores(vec![
            definition("generic", "", "postgres"),
            definition("postgres", "postgres-", "postgres"),
        ]);
        let found = stores
            .definition_for_release(&release("postgres-db", "postgres"))
            .unwrap();
        assert_eq!(found.name_any(), "postgres");

        let fallback = stores
            .definition_for_release(&release("other", "postgres"))
            .unwrap();
        assert_eq!(fallback.name_any(), "generic");

        assert!(stores
            .definition_for_release(&release("x", "redis"))
            .is_none());
    }

    #[test]
    fn test_definitions_sorted() {
        let stores = stores(vec![
            definition("b", "b-", "b"),
            definition("a", "a-", "a"),
        ]);
        let names: Vec<String> = stores.definitions().iter().map(|d| d.name_any()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
