// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::Package;
    use crate::crd_install::*;
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::{Client, CustomResourceExt};
    use serde_json::json;
    use std::io::Write;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn established(crd: &CustomResourceDefinition, status: &str) -> serde_json::Value {
        let mut value = serde_json::to_value(crd).unwrap();
        value["status"] = json!({
            "conditions": [{"type": "Established", "status": status}],
            "acceptedNames": {"kind": "Package", "plural": "packages"},
            "storedVersions": ["v1alpha1"]
        });
        value
    }

    fn mock_client(server: &MockServer) -> Client {
        let config = kube::Config::new(server.uri().parse().unwrap());
        Client::try_from(config).unwrap()
    }

    #[test]
    fn test_all_crds_are_unique_and_named_by_group() {
        let crds = all_crds();
        assert_eq!(crds.len(), 11);
        let mut names: Vec<String> = crds
            .iter()
            .map(|c| c.metadata.name.clone().unwrap())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 11);
        assert!(names.contains(&"packagesources.cozystack.io".to_string()));
        assert!(names.contains(&"backupjobs.backups.cozystack.io".to_string()));
    }

    #[test]
    fn test_manifest_parses_back() {
        let manifest = render_manifest(&all_crds()).unwrap();
        let parsed = parse_manifest(&manifest).unwrap();
        assert_eq!(parsed.len(), 11);
        assert_eq!(parsed[0].spec.names.kind, "PackageSource");
    }

    #[test]
    fn test_parse_manifest_skips_empty_documents() {
        let manifest = format!(
            "---\n---\n{}\n---\n",
            serde_yaml::to_string(&Package::crd()).unwrap()
        );
        assert_eq!(parse_manifest(&manifest).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_manifest_rejects_other_kinds() {
        let manifest = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n";
        assert!(matches!(
            parse_manifest(manifest),
            Err(CrdInstallError::NotACrd { index: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_load_manifest_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(render_manifest(&[Package::crd()]).unwrap().as_bytes())
            .unwrap();
        let crds = load_manifest(file.path()).await.unwrap();
        assert_eq!(crds[0].spec.group, "cozystack.io");

        let missing = load_manifest(std::path::Path::new("/nonexistent/crds.yaml")).await;
        assert!(matches!(missing, Err(CrdInstallError::Read { .. })));
    }

    #[test]
    fn test_is_established() {
        let crd = Package::crd();
        assert!(!is_established(&crd));
        let ready: CustomResourceDefinition =
            serde_json::from_value(established(&crd, "True")).unwrap();
        assert!(is_established(&ready));
        let pending: CustomResourceDefinition =
            serde_json::from_value(established(&crd, "False")).unwrap();
        assert!(!is_established(&pending));
    }

    #[tokio::test]
    async fn test_install_applies_and_waits() {
        let server = MockServer::start().await;
        let crd = Package::crd();
        let crd_path = "/apis/apiextensions.k8s.io/v1/customresourcedefinitions/packages.cozystack.io";

        Mock::given(method("PATCH"))
            .and(path(crd_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(established(&crd, "False")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(crd_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(established(&crd, "True")))
            .mount(&server)
            .await;

        install_crds(mock_client(&server), &[crd], Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_install_times_out_when_never_established() {
        let server = MockServer::start().await;
        let crd = Package::crd();
        let crd_path = "/apis/apiextensions.k8s.io/v1/customresourcedefinitions/packages.cozystack.io";

        Mock::given(method("PATCH"))
            .and(path(crd_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(established(&crd, "False")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(crd_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(established(&crd, "False")))
            .mount(&server)
            .await;

        let result = install_crds(mock_client(&server), &[crd], Duration::from_millis(200)).await;
        assert!(matches!(result, Err(CrdInstallError::NotEstablished { .. })));
    }
}
