// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `package.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{ComponentInstall, PackageComponentOverride, PackageSourceSpec, PackageSpec};
    use serde_json::json;

    fn installable(name: &str, namespace: &str) -> Component {
        Component {
            name: name.to_string(),
            path: format!("apps/{name}"),
            install: Some(ComponentInstall {
                namespace: Some(namespace.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn source(name: &str, variants: Vec<Variant>) -> PackageSource {
        PackageSource::new(
            name,
            PackageSourceSpec {
                source_ref: None,
                variants,
            },
        )
    }

    fn package(name: &str) -> Package {
        let mut p = Package::new(name, PackageSpec::default());
        p.metadata.uid = Some(format!("{name}-uid"));
        p
    }

    fn pg_fixture() -> (Package, PackageSource) {
        let mut primary = installable("primary", "tenant-a");
        primary.install.as_mut().unwrap().release_name = Some("pg-0".into());
        let ps = source(
            "pg",
            vec![Variant {
                name: "default".into(),
                components: vec![primary],
                ..Default::default()
            }],
        );
        (package("pg"), ps)
    }

    #[test]
    fn test_single_component_release() {
        let (pkg, ps) = pg_fixture();
        let index = PackageIndex::new(vec![pkg.clone()], vec![ps.clone()]);
        let variant = find_variant(&ps, variant_name(&pkg)).unwrap();

        let releases = desired_releases(&pkg, variant, &index, "cozy-system").unwrap();
        assert_eq!(releases.len(), 1);
        let hr = &releases[0];
        assert_eq!(hr.name_any(), "pg-0");
        assert_eq!(hr.namespace().as_deref(), Some("tenant-a"));
        assert_eq!(hr.labels()["cozystack.io/package"], "pg");
        assert!(!hr.labels().contains_key("cozystack.io/privileged"));

        let chart_ref = hr.spec.chart_ref.as_ref().unwrap();
        assert_eq!(chart_ref.kind, "ExternalArtifact");
        assert_eq!(chart_ref.name, "pg-default-primary");
        assert_eq!(chart_ref.namespace.as_deref(), Some("cozy-system"));
        assert_eq!(hr.spec.interval, "5m");
        assert_eq!(
            hr.spec.install.as_ref().unwrap().remediation.as_ref().unwrap().retries,
            Some(-1)
        );
        assert_eq!(hr.owner_references()[0].kind, "Package");
        assert_eq!(hr.owner_references()[0].controller, Some(true));
        assert!(hr.spec.depends_on.is_empty());
    }

    #[test]
    fn test_variant_defaults() {
        let mut pkg = package("pg");
        assert_eq!(variant_name(&pkg), "default");
        pkg.spec.variant = Some(String::new());
        assert_eq!(variant_name(&pkg), "default");
        pkg.spec.variant = Some("ha".into());
        assert_eq!(variant_name(&pkg), "ha");
    }

    #[test]
    fn test_enabled_resolution() {
        let mut pkg = package("pg");
        let mut comp = installable("extra", "tenant-a");
        assert!(is_enabled(&pkg, &comp));

        comp.install.as_mut().unwrap().disabled = true;
        assert!(!is_enabled(&pkg, &comp));

        pkg.spec.components.insert(
            "extra".into(),
            PackageComponentOverride {
                enabled: Some(true),
                values: Some(json!({"replicas": 2})),
            },
        );
        assert!(is_enabled(&pkg, &comp));

        comp.install = None;
        assert!(!is_enabled(&pkg, &comp));
    }

    #[test]
    fn test_override_values_and_privileged_label() {
        let (mut pkg, mut ps) = pg_fixture();
        ps.spec.variants[0].components[0]
            .install
            .as_mut()
            .unwrap()
            .privileged = true;
        pkg.spec.components.insert(
            "primary".into(),
            PackageComponentOverride {
                enabled: None,
                values: Some(json!({"replicas": 3})),
            },
        );
        let variant = &ps.spec.variants[0];
        let hr = build_release(&pkg, variant, &variant.components[0], vec![], "cozy-system");
        assert_eq!(hr.spec.values, Some(json!({"replicas": 3})));
        assert_eq!(hr.labels()["cozystack.io/privileged"], "true");
    }

    #[test]
    fn test_namespace_requirements_or_privileged() {
        let pkg = package("infra");
        let mut a = installable("a", "cozy-infra");
        a.install.as_mut().unwrap().privileged = true;
        let b = installable("b", "cozy-infra");
        let c = installable("c", "cozy-other");
        let variant = Variant {
            name: "default".into(),
            components: vec![a, b, c],
            ..Default::default()
        };
        let namespaces = namespace_requirements(&pkg, &variant).unwrap();
        assert_eq!(namespaces.get("cozy-infra"), Some(&true));
        assert_eq!(namespaces.get("cozy-other"), Some(&false));
    }

    #[test]
    fn test_namespace_requirements_rejects_empty_namespace() {
        let pkg = package("infra");
        let variant = Variant {
            name: "default".into(),
            components: vec![installable("a", "")],
            ..Default::default()
        };
        assert!(namespace_requirements(&pkg, &variant).is_err());
    }

    #[test]
    fn test_missing_dependency_blocks() {
        let mut app = source(
            "app",
            vec![Variant {
                name: "default".into(),
                depends_on: vec!["db".into()],
                components: vec![installable("web", "cozy-app")],
                ..Default::default()
            }],
        );
        let pkg = package("app");
        let index = PackageIndex::new(vec![pkg.clone()], vec![app.clone()]);
        let err = validate_dependencies(&pkg, &app.spec.variants[0], &index).unwrap_err();
        assert_eq!(err, DependencyError::PackageNotFound("db".into()));
        assert_eq!(
            format!("Variant dependencies not ready: {err}"),
            "Variant dependencies not ready: dependent Package db not found"
        );

        let index = PackageIndex::new(vec![pkg.clone(), package("db")], vec![app.clone()]);
        assert_eq!(
            validate_dependencies(&pkg, &app.spec.variants[0], &index).unwrap_err(),
            DependencyError::PackageSourceNotFound("db".into())
        );

        app.spec.variants[0].depends_on.clear();
        assert!(validate_dependencies(&pkg, &app.spec.variants[0], &index).is_ok());
    }

    #[test]
    fn test_cross_package_depends_on_deduped() {
        let db = source(
            "db",
            vec![Variant {
                name: "default".into(),
                components: vec![installable("primary", "cozy-db"), installable("replica", "cozy-db")],
                ..Default::default()
            }],
        );
        let mut web = installable("web", "cozy-app");
        web.install.as_mut().unwrap().depends_on = vec!["cache".into()];
        let app = source(
            "app",
            vec![Variant {
                name: "default".into(),
                depends_on: vec!["db".into(), "db".into()],
                components: vec![installable("cache", "cozy-app"), web],
                ..Default::default()
            }],
        );
        let pkg = package("app");
        let index = PackageIndex::new(vec![pkg.clone(), package("db")], vec![app.clone(), db]);
        let variant = &app.spec.variants[0];

        let deps = build_depends_on(&pkg, variant, &variant.components[1], &index, "cozy-system").unwrap();
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["cache", "primary", "replica"]);
        assert_eq!(deps[1].namespace.as_deref(), Some("cozy-system"));
    }

    #[test]
    fn test_ignored_dependency_skipped() {
        let app = source(
            "app",
            vec![Variant {
                name: "default".into(),
                depends_on: vec!["db".into()],
                components: vec![installable("web", "cozy-app")],
                ..Default::default()
            }],
        );
        let mut pkg = package("app");
        pkg.spec.ignore_dependencies = vec!["db".into()];
        let index = PackageIndex::new(vec![pkg.clone()], vec![app.clone()]);
        let variant = &app.spec.variants[0];
        assert!(validate_dependencies(&pkg, variant, &index).is_ok());
        let releases = desired_releases(&pkg, variant, &index, "cozy-system").unwrap();
        assert!(releases[0].spec.depends_on.is_empty());
    }

    #[test]
    fn test_missing_intra_variant_component() {
        let mut web = installable("web", "cozy-app");
        web.install.as_mut().unwrap().depends_on = vec!["ghost".into()];
        let app = source(
            "app",
            vec![Variant {
                name: "default".into(),
                components: vec![web],
                ..Default::default()
            }],
        );
        let pkg = package("app");
        let index = PackageIndex::new(vec![pkg.clone()], vec![app.clone()]);
        let (component, err) =
            desired_releases(&pkg, &app.spec.variants[0], &index, "cozy-system").unwrap_err();
        assert_eq!(component, "web");
        assert!(matches!(err, DependencyError::ComponentNotFound { .. }));
    }

    #[test]
    fn test_dependents_of() {
        let db = source("db", vec![Variant { name: "default".into(), ..Default::default() }]);
        let app = source(
            "app",
            vec![Variant {
                name: "default".into(),
                depends_on: vec!["db".into()],
                ..Default::default()
            }],
        );
        let other = source(
            "other",
            vec![Variant {
                name: "default".into(),
                depends_on: vec!["db".into()],
                ..Default::default()
            }],
        );
        let mut ignoring = package("other");
        ignoring.spec.ignore_dependencies = vec!["db".into()];
        let index = PackageIndex::new(
            vec![package("db"), package("app"), ignoring],
            vec![db, app, other],
        );
        assert_eq!(index.dependents_of("db"), vec!["app".to_string()]);
        assert!(index.dependents_of("app").is_empty());
        assert_eq!(dependents_to_enqueue(&index, "db")[0].name, "app");
    }
}
