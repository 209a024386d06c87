// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use k8s_openapi::api::core::v1::Namespace;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kube::{Api, Client};
    use serde_json::json;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn namespace(name: &str, labels: &[(&str, &str)]) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(
                    labels
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                        .collect(),
                ),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_namespace_labels() {
        let system = namespace_labels("cozy-postgres-operator", true, "tenant-");
        assert_eq!(system["cozystack.io/system"], "true");
        assert_eq!(system["pod-security.kubernetes.io/enforce"], "privileged");

        let tenant = namespace_labels("tenant-a", false, "tenant-");
        assert!(tenant.is_empty());
    }

    #[test]
    fn test_merge_into_keeps_existing_keys() {
        let mut target = Some(BTreeMap::from([("owner".to_string(), "user".to_string())]));
        merge_into(
            &mut target,
            &BTreeMap::from([("cozystack.io/system".to_string(), "true".to_string())]),
        );
        let target = target.unwrap();
        assert_eq!(target["owner"], "user");
        assert_eq!(target["cozystack.io/system"], "true");

        let mut untouched: Option<BTreeMap<String, String>> = None;
        merge_into(&mut untouched, &BTreeMap::new());
        assert!(untouched.is_none());
    }

    #[test]
    fn test_differs_ignores_server_fields() {
        let mut live = namespace("tenant-a", &[("a", "1")]);
        live.metadata.resource_version = Some("42".into());
        live.metadata.uid = Some("uid".into());
        let desired = namespace("tenant-a", &[("a", "1")]);
        assert!(!differs(&live, &desired));

        let changed = namespace("tenant-a", &[("a", "2")]);
        assert!(differs(&live, &changed));
    }

    #[tokio::test]
    async fn test_create_or_update_creates_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces/tenant-a"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "kind": "Status", "apiVersion": "v1", "status": "Failure",
                "message": "not found", "reason": "NotFound", "code": 404
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/namespaces"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::to_value(namespace("tenant-a", &[])).unwrap()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::try_from(kube::Config::new(server.uri().parse().unwrap())).unwrap();
        let api: Api<Namespace> = Api::all(client);
        let op = create_or_update(&api, namespace("tenant-a", &[]), |_| Ok(()))
            .await
            .unwrap();
        assert_eq!(op, Operation::Created);
    }

    #[tokio::test]
    async fn test_create_or_update_skips_identical() {
        let server = MockServer::start().await;
        let mut live = namespace("cozy-system", &[("cozystack.io/system", "true")]);
        live.metadata.resource_version = Some("7".into());
        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces/cozy-system"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::to_value(&live).unwrap()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = Client::try_from(kube::Config::new(server.uri().parse().unwrap())).unwrap();
        let api: Api<Namespace> = Api::all(client);
        let op = create_or_update(&api, namespace("cozy-system", &[]), |ns| {
            merge_into(
                &mut ns.metadata.labels,
                &BTreeMap::from([("cozystack.io/system".to_string(), "true".to_string())]),
            );
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(op, Operation::Unchanged);
    }
}
