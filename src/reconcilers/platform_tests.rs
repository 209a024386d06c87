// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `platform.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::PlatformSpec;

    fn platform(kind: &str) -> Platform {
        let mut p = Platform::new(
            "cozystack",
            PlatformSpec {
                source_ref: SourceRef {
                    kind: kind.to_string(),
                    name: "cozystack-repo".into(),
                    namespace: "cozy-system".into(),
                    path: None,
                },
                values: Some(json!({"bundle": "paas-full", "sourceRef": "overwritten"})),
                interval: None,
                base_path: None,
            },
        );
        p.metadata.uid = Some("platform-uid".into());
        p
    }

    #[test]
    fn test_default_base_paths() {
        assert_eq!(platform_base_path(&platform("GitRepository")), "packages/core/platform");
        assert_eq!(platform_base_path(&platform("OCIRepository")), "core/platform");

        let mut custom = platform("GitRepository");
        custom.spec.base_path = Some("/charts/root/".into());
        assert_eq!(platform_base_path(&custom), "charts/root");
        assert_eq!(platform_artifact_name(&custom), "root");
    }

    #[test]
    fn test_generator() {
        let ag = build_artifact_generator(&platform("GitRepository"), "cozy-system");
        assert_eq!(ag.name_any(), "cozystack-repo");
        assert_eq!(ag.labels()["cozystack.io/platform"], "cozystack");
        let artifact = &ag.spec.output_artifacts[0];
        assert_eq!(artifact.name, "platform");
        assert_eq!(artifact.copy[0].from, "@cozystack-repo/packages/core/platform/**");
        assert_eq!(artifact.copy[0].to, "@artifact/platform/");
    }

    #[test]
    fn test_release() {
        let hr = build_release(&platform("GitRepository"), "cozy-system");
        assert_eq!(hr.name_any(), "cozystack-platform");
        assert_eq!(hr.spec.release_name.as_deref(), Some("cozystack-platform"));
        assert_eq!(hr.spec.target_namespace.as_deref(), Some("cozy-system"));
        assert_eq!(hr.spec.interval, "5m");
        assert_eq!(hr.spec.chart_ref.as_ref().unwrap().name, "platform");
        assert_eq!(
            hr.spec.values,
            Some(json!({
                "bundle": "paas-full",
                "sourceRef": {"kind": "GitRepository", "name": "cozystack-repo", "namespace": "cozy-system"}
            }))
        );
        assert_eq!(hr.owner_references()[0].kind, "Platform");
        assert_eq!(labeled_platform(hr.labels()).as_deref(), Some("cozystack"));
    }

    #[test]
    fn test_values_without_input() {
        let source_ref = SourceRef {
            kind: "OCIRepository".into(),
            name: "repo".into(),
            namespace: "cozy-system".into(),
            path: None,
        };
        assert_eq!(
            platform_values(None, &source_ref),
            json!({"sourceRef": {"kind": "OCIRepository", "name": "repo", "namespace": "cozy-system"}})
        );
    }
}
