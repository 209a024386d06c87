// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Boot-time installation of the operator's own CustomResourceDefinitions.
//!
//! CRDs are rendered from the Rust types (the same source `crdgen` writes to
//! `deploy/crds/`), or read from a multi-document YAML manifest. Each one is
//! server-side applied under [`CRD_FIELD_MANAGER`], then polled until the API
//! server reports `Established=True`.

use crate::backup_crd::{Backup, BackupClass, BackupJob, Plan, RestoreJob};
use crate::constants::{CRD_ESTABLISHED_POLL_MILLIS, CRD_FIELD_MANAGER};
use crate::crd::{
    ApplicationDefinition, Bundle, Package, PackageSource, Platform, PlatformConfiguration,
};
use crate::status_reasons::{CONDITION_TRUE, CONDITION_TYPE_ESTABLISHED};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt, ResourceExt};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CrdInstallError {
    #[error("failed to read CRD manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid CRD manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("CRD manifest document {index} is not a CustomResourceDefinition (kind '{kind}')")]
    NotACrd { index: usize, kind: String },

    #[error("failed to apply CRD {name}: {source}")]
    Apply {
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("CRD {name} not established after {waited:?}")]
    NotEstablished { name: String, waited: Duration },
}

/// Every CRD owned by the operator, in install order.
#[must_use]
pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![
        PackageSource::crd(),
        Package::crd(),
        Bundle::crd(),
        Platform::crd(),
        PlatformConfiguration::crd(),
        ApplicationDefinition::crd(),
        BackupClass::crd(),
        BackupJob::crd(),
        Plan::crd(),
        Backup::crd(),
        RestoreJob::crd(),
    ]
}

/// Renders CRDs as one multi-document YAML stream.
///
/// # Errors
///
/// Returns an error if a CRD cannot be serialized.
pub fn render_manifest(crds: &[CustomResourceDefinition]) -> Result<String, serde_yaml::Error> {
    let mut out = String::new();
    for crd in crds {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(crd)?);
    }
    Ok(out)
}

/// Parses a multi-document YAML stream. Empty documents are skipped.
///
/// # Errors
///
/// Returns [`CrdInstallError`] on malformed YAML or a document of another kind.
pub fn parse_manifest(manifest: &str) -> Result<Vec<CustomResourceDefinition>, CrdInstallError> {
    let mut crds = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(manifest).enumerate() {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        let kind = value
            .get("kind")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default()
            .to_string();
        if kind != "CustomResourceDefinition" {
            return Err(CrdInstallError::NotACrd { index, kind });
        }
        crds.push(serde_yaml::from_value(value)?);
    }
    Ok(crds)
}

/// Reads and parses a manifest file.
///
/// # Errors
///
/// Returns [`CrdInstallError`] if the file cannot be read or parsed.
pub async fn load_manifest(path: &Path) -> Result<Vec<CustomResourceDefinition>, CrdInstallError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CrdInstallError::Read {
            path: path.display().to_string(),
            source,
        })?;
    parse_manifest(&raw)
}

/// Whether the API server has accepted the CRD's names and started serving it.
#[must_use]
pub fn is_established(crd: &CustomResourceDefinition) -> bool {
    crd.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == CONDITION_TYPE_ESTABLISHED && c.status == CONDITION_TRUE)
        })
}

/// Applies every CRD and waits until all of them are established.
///
/// # Errors
///
/// Returns [`CrdInstallError`] when an apply fails or a CRD is not
/// established before `timeout`.
pub async fn install_crds(
    client: Client,
    crds: &[CustomResourceDefinition],
    timeout: Duration,
) -> Result<(), CrdInstallError> {
    let api: Api<CustomResourceDefinition> = Api::all(client);
    let params = PatchParams::apply(CRD_FIELD_MANAGER).force();

    for crd in crds {
        let name = crd.name_any();
        let mut desired = crd.clone();
        desired.metadata.managed_fields = None;
        desired.metadata.resource_version = None;
        desired.status = None;

        api.patch(&name, &params, &Patch::Apply(&desired))
            .await
            .map_err(|source| CrdInstallError::Apply {
                name: name.clone(),
                source,
            })?;
        info!(crd = %name, "Applied CRD");
    }

    let deadline = Instant::now() + timeout;
    for crd in crds {
        let name = crd.name_any();
        loop {
            match api.get_opt(&name).await {
                Ok(Some(current)) if is_established(&current) => {
                    debug!(crd = %name, "CRD established");
                    break;
                }
                Ok(_) => {}
                Err(e) => debug!(crd = %name, error = %e, "Failed to read CRD, retrying"),
            }
            if Instant::now() >= deadline {
                return Err(CrdInstallError::NotEstablished {
                    name,
                    waited: timeout,
                });
            }
            sleep(Duration::from_millis(CRD_ESTABLISHED_POLL_MILLIS)).await;
        }
    }

    info!(count = crds.len(), "All CRDs established");
    Ok(())
}

#[cfg(test)]
#[path = "crd_install_tests.rs"]
mod crd_install_tests;
