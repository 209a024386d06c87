// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `class_resolver.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::backup_crd::{ApplicationSelector, BackupClassSpec, BackupClassStrategy};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn strategy(name: &str, group: Option<&str>, kind: &str, location: &str) -> BackupClassStrategy {
        BackupClassStrategy {
            strategy_ref: TypedLocalObjectReference {
                api_group: Some("strategy.backups.cozystack.io".into()),
                kind: "Velero".into(),
                name: name.into(),
            },
            application: ApplicationSelector {
                api_group: group.map(String::from),
                kind: kind.into(),
            },
            parameters: BTreeMap::from([(
                "backupStorageLocationName".to_string(),
                location.to_string(),
            )]),
        }
    }

    fn class() -> BackupClass {
        BackupClass::new(
            "velero",
            BackupClassSpec {
                strategies: vec![
                    strategy("velero-strategy-vm", None, "VirtualMachine", "default"),
                    strategy("velero-strategy-mysql", Some(""), "MySQL", "mysql-storage"),
                    strategy("velero-strategy-custom", Some("custom.io"), "MySQL", "custom"),
                ],
            },
        )
    }

    fn app(group: Option<&str>, kind: &str) -> TypedLocalObjectReference {
        TypedLocalObjectReference {
            api_group: group.map(String::from),
            kind: kind.into(),
            name: "app".into(),
        }
    }

    #[test]
    fn test_defaulted_groups_match() {
        let resolved = match_strategy(&class(), &app(None, "VirtualMachine")).unwrap();
        assert_eq!(resolved.strategy_ref.name, "velero-strategy-vm");
        assert_eq!(resolved.parameters["backupStorageLocationName"], "default");

        let resolved = match_strategy(&class(), &app(Some("apps.cozystack.io"), "MySQL")).unwrap();
        assert_eq!(resolved.strategy_ref.name, "velero-strategy-mysql");
    }

    #[test]
    fn test_explicit_group_matches() {
        let resolved = match_strategy(&class(), &app(Some("custom.io"), "MySQL")).unwrap();
        assert_eq!(resolved.strategy_ref.name, "velero-strategy-custom");
    }

    #[test]
    fn test_no_match_is_an_error() {
        let err = match_strategy(&class(), &app(None, "Redis")).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::NoMatchingStrategy { ref kind, ref group, .. }
                if kind == "Redis" && group == "apps.cozystack.io"
        ));
    }

    #[tokio::test]
    async fn test_missing_class() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/backups.cozystack.io/v1alpha1/backupclasses/absent"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "kind": "Status", "apiVersion": "v1", "status": "Failure",
                "message": "not found", "reason": "NotFound", "code": 404
            })))
            .mount(&server)
            .await;

        let client = Client::try_from(kube::Config::new(server.uri().parse().unwrap())).unwrap();
        let err = resolve_backup_class(&client, "absent", &app(None, "VirtualMachine"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::ClassNotFound(ref name) if name == "absent"));
    }

    #[tokio::test]
    async fn test_resolves_from_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/backups.cozystack.io/v1alpha1/backupclasses/velero"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::to_value(class()).unwrap()))
            .mount(&server)
            .await;

        let client = Client::try_from(kube::Config::new(server.uri().parse().unwrap())).unwrap();
        let resolved = resolve_backup_class(&client, "velero", &app(None, "MySQL"))
            .await
            .unwrap();
        assert_eq!(resolved.strategy_ref.name, "velero-strategy-mysql");
    }
}
