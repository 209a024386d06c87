// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `workload_monitor.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::ApplicationDefinitionSpec;
    use crate::external::{HelmReleaseSpec, HelmReleaseStatus, Snapshot};

    fn release(values: Value) -> HelmRelease {
        let mut hr = HelmRelease::new(
            "redis-cache",
            HelmReleaseSpec {
                values: Some(values),
                ..Default::default()
            },
        );
        hr.metadata.namespace = Some("tenant-a".into());
        hr.metadata.uid = Some("hr-uid".into());
        hr.status = Some(HelmReleaseStatus {
            history: vec![Snapshot {
                chart_name: "redis".into(),
                chart_version: "0.7.1".into(),
                status: "deployed".into(),
            }],
            ..Default::default()
        });
        hr
    }

    fn template(name: &str) -> WorkloadMonitorTemplate {
        WorkloadMonitorTemplate {
            name: name.to_string(),
            kind: "redis".into(),
            r#type: "redis".into(),
            selector: BTreeMap::from([(
                "app.kubernetes.io/instance".to_string(),
                "{{ .Release.Name }}".to_string(),
            )]),
            replicas: Some("{{ .Values.replicas }}".into()),
            min_replicas: Some("{{ div .Values.replicas 2 | add1 }}".into()),
            condition: None,
        }
    }

    #[test]
    fn test_template_data() {
        let data = template_data(&release(json!({"replicas": 3})));
        assert_eq!(data["Release"]["Name"], "redis-cache");
        assert_eq!(data["Release"]["Namespace"], "tenant-a");
        assert_eq!(data["Chart"]["Version"], "0.7.1");
        assert_eq!(data["Values"]["replicas"], 3);
    }

    #[test]
    fn test_render_monitor() {
        let hr = release(json!({"replicas": 3}));
        let data = template_data(&hr);
        let monitor = render_monitor(&template("{{ .Release.Name }}"), &hr, &data).unwrap();

        assert_eq!(monitor.name_any(), "redis-cache");
        assert_eq!(monitor.namespace().as_deref(), Some("tenant-a"));
        assert_eq!(monitor.spec.selector["app.kubernetes.io/instance"], "redis-cache");
        assert_eq!(monitor.spec.replicas, Some(3));
        assert_eq!(monitor.spec.min_replicas, Some(2));
        assert_eq!(monitor.spec.version.as_deref(), Some("0.7.1"));
        assert_eq!(monitor.labels()["workloadmonitor.cozystack.io/owned-by-crd"], "true");
        assert_eq!(monitor.labels()["workloadmonitor.cozystack.io/helm-release"], "redis-cache");
        assert_eq!(monitor.owner_references()[0].kind, "HelmRelease");
    }

    #[test]
    fn test_unparseable_count_is_unset() {
        let hr = release(json!({"replicas": "many"}));
        let data = template_data(&hr);
        let mut t = template("{{ .Release.Name }}");
        t.min_replicas = None;
        let monitor = render_monitor(&t, &hr, &data).unwrap();
        assert_eq!(monitor.spec.replicas, None);
        assert_eq!(monitor.spec.min_replicas, None);
    }

    #[test]
    fn test_conditions() {
        let hr = release(json!({"replicas": 1, "sentinel": {"enabled": false}}));
        let mut def = ApplicationDefinition::new("redis", ApplicationDefinitionSpec::default());

        let mut gated = template("{{ .Release.Name }}-sentinel");
        gated.condition = Some("{{ .Values.sentinel.enabled }}".into());
        let mut always = template("{{ .Release.Name }}");
        always.condition = Some(String::new());
        def.spec.workload_monitors = vec![always, gated];

        let names: Vec<String> = desired_monitors(&hr, &def).iter().map(ResourceExt::name_any).collect();
        assert_eq!(names, vec!["redis-cache"]);

        let hr = release(json!({"replicas": 1, "sentinel": {"enabled": true}}));
        assert_eq!(desired_monitors(&hr, &def).len(), 2);
    }

    #[test]
    fn test_owned_selector() {
        assert_eq!(
            owned_selector("redis-cache"),
            "workloadmonitor.cozystack.io/owned-by-crd=true,workloadmonitor.cozystack.io/helm-release=redis-cache"
        );
    }
}
