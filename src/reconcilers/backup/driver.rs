// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backup drivers.
//!
//! A driver turns a resolved strategy into work done by an external engine
//! and reports progress back. Drivers are polled: each call makes sure the
//! engine's object exists and returns what it currently says.
//!
//! The only driver is [`Velero`], which creates `velero.io/v1` `Backup` and
//! `Restore` objects next to the job and watches their `status.phase`.

use crate::backup_crd::{Backup, BackupJob, RestoreJob, TypedLocalObjectReference};
use crate::constants::KIND_VELERO_STRATEGY;
use crate::external::{velero_backup_resource, velero_restore_resource};
use crate::labels::{APPLICATION_KIND, APPLICATION_NAME};
use crate::reconcilers::backup::class_resolver::ResolvedBackupConfig;
use crate::reconcilers::resources::owner_reference;
use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::api::{ApiResource, DynamicObject, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

/// Parameter naming the Velero storage location.
pub const STORAGE_LOCATION_PARAMETER: &str = "backupStorageLocationName";

/// Parameter carrying the Velero backup TTL.
pub const TTL_PARAMETER: &str = "ttl";

const DEFAULT_STORAGE_LOCATION: &str = "default";

/// Driver metadata key of the Velero backup name.
pub const VELERO_BACKUP_NAME_KEY: &str = "velero.io/backup-name";

/// Driver metadata key of the Velero backup namespace.
pub const VELERO_BACKUP_NAMESPACE_KEY: &str = "velero.io/backup-namespace";

/// What a driver produced, recorded on the `Backup` object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverArtifact {
    pub uri: String,
    /// RFC3339 time the engine started taking the backup.
    pub taken_at: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Progress reported by a driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriverProgress {
    /// Not finished yet, poll again.
    InProgress,
    Completed(Option<DriverArtifact>),
    Failed(String),
}

#[async_trait]
pub trait BackupDriver: Send + Sync {
    /// Strategy kind this driver serves.
    fn kind(&self) -> &'static str;

    /// Ensures the backup of `job` is running and reports its progress.
    async fn backup(
        &self,
        job: &BackupJob,
        started_at: DateTime<Utc>,
        config: &ResolvedBackupConfig,
    ) -> Result<DriverProgress>;

    /// Ensures `job` is restoring `backup` into `target` and reports its progress.
    async fn restore(
        &self,
        job: &RestoreJob,
        backup: &Backup,
        target: &TypedLocalObjectReference,
    ) -> Result<DriverProgress>;
}

/// Driver for a strategy kind, if one exists.
#[must_use]
pub fn driver_for(kind: &str, client: &Client) -> Option<Box<dyn BackupDriver>> {
    match kind {
        KIND_VELERO_STRATEGY => Some(Box::new(Velero::new(client.clone()))),
        _ => None,
    }
}

/// Velero `Backup` name of a job: `{job}-velero-{YYYY-MM-DD-HH-MM-SS}`.
#[must_use]
pub fn velero_backup_name(job: &str, started_at: DateTime<Utc>) -> String {
    format!("{job}-velero-{}", started_at.format("%Y-%m-%d-%H-%M-%S"))
}

/// Velero `Restore` name of a restore job.
#[must_use]
pub fn velero_restore_name(job: &str) -> String {
    format!("{job}-velero-restore")
}

/// Label selector limiting a Velero backup to one application's objects.
#[must_use]
pub fn application_selector(application: &TypedLocalObjectReference) -> Value {
    json!({
        "matchLabels": {
            APPLICATION_KIND: application.kind,
            APPLICATION_NAME: application.name,
        }
    })
}

fn owned_object<K>(resource: &ApiResource, name: &str, owner: &K, spec: Value) -> DynamicObject
where
    K: Resource<DynamicType = ()>,
{
    let mut object = DynamicObject::new(name, resource);
    object.metadata.namespace = owner.namespace();
    object.metadata.owner_references = owner_reference(owner, true).map(|r| vec![r]);
    object.data = json!({ "spec": spec });
    object
}

/// Velero `Backup` for `job`.
#[must_use]
pub fn velero_backup_object(job: &BackupJob, name: &str, config: &ResolvedBackupConfig) -> DynamicObject {
    let storage_location = config
        .parameters
        .get(STORAGE_LOCATION_PARAMETER)
        .map_or(DEFAULT_STORAGE_LOCATION, String::as_str);
    let mut spec = json!({
        "includedNamespaces": [job.namespace().unwrap_or_default()],
        "labelSelector": application_selector(&job.spec.application_ref),
        "storageLocation": storage_location,
    });
    if let Some(ttl) = config.parameters.get(TTL_PARAMETER) {
        spec["ttl"] = json!(ttl);
    }
    owned_object(&velero_backup_resource(), name, job, spec)
}

/// Velero `Restore` for `job`, or `None` when `backup` was not taken by Velero.
#[must_use]
pub fn velero_restore_object(
    job: &RestoreJob,
    backup: &Backup,
    target: &TypedLocalObjectReference,
) -> Option<DynamicObject> {
    let backup_name = backup.spec.driver_metadata.get(VELERO_BACKUP_NAME_KEY)?;
    let spec = json!({
        "backupName": backup_name,
        "includedNamespaces": [job.namespace().unwrap_or_default()],
        "labelSelector": application_selector(target),
    });
    Some(owned_object(
        &velero_restore_resource(),
        &velero_restore_name(&job.name_any()),
        job,
        spec,
    ))
}

/// Maps a Velero object's `status` to driver progress.
#[must_use]
pub fn velero_progress(object: &DynamicObject, kind: &str) -> DriverProgress {
    let status = &object.data["status"];
    let phase = status["phase"].as_str().unwrap_or_default();
    match phase {
        "Completed" => DriverProgress::Completed(None),
        "Failed" | "PartiallyFailed" => {
            let message = status["failureReason"]
                .as_str()
                .or_else(|| status["message"].as_str())
                .filter(|m| !m.is_empty())
                .map_or_else(
                    || format!("Velero {kind} failed with phase: {phase}"),
                    String::from,
                );
            DriverProgress::Failed(message)
        }
        _ => DriverProgress::InProgress,
    }
}

/// Artifact describing a completed Velero backup.
#[must_use]
pub fn velero_artifact(object: &DynamicObject) -> DriverArtifact {
    let name = object.name_any();
    let namespace = object.namespace().unwrap_or_default();
    let taken_at = object.data["status"]["startTimestamp"]
        .as_str()
        .filter(|t| DateTime::parse_from_rfc3339(t).is_ok())
        .map(String::from)
        .or_else(|| {
            object
                .metadata
                .creation_timestamp
                .as_ref()
                .and_then(|t| {
                    DateTime::from_timestamp(t.0.as_second(), t.0.subsec_nanosecond() as u32)
                })
                .map(|t| t.to_rfc3339())
        });
    DriverArtifact {
        uri: format!("velero://{namespace}/{name}"),
        taken_at,
        metadata: BTreeMap::from([
            (VELERO_BACKUP_NAME_KEY.to_string(), name),
            (VELERO_BACKUP_NAMESPACE_KEY.to_string(), namespace),
        ]),
    }
}

pub struct Velero {
    client: Client,
}

impl Velero {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetches `object`, creating it first when missing. Returns `None` right
    /// after creation.
    async fn get_or_create(&self, resource: &ApiResource, object: DynamicObject) -> Result<Option<DynamicObject>> {
        let name = object.name_any();
        let namespace = object
            .namespace()
            .ok_or_else(|| anyhow!("Velero {} {name} has no namespace", resource.kind))?;
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), &namespace, resource);
        if let Some(existing) = api
            .get_opt(&name)
            .await
            .with_context(|| format!("failed to get Velero {} {name}", resource.kind))?
        {
            return Ok(Some(existing));
        }
        api.create(&PostParams::default(), &object)
            .await
            .with_context(|| format!("failed to create Velero {} {name}", resource.kind))?;
        info!(kind = %resource.kind, name = %name, namespace = %namespace, "Created Velero object");
        Ok(None)
    }
}

#[async_trait]
impl BackupDriver for Velero {
    fn kind(&self) -> &'static str {
        KIND_VELERO_STRATEGY
    }

    async fn backup(
        &self,
        job: &BackupJob,
        started_at: DateTime<Utc>,
        config: &ResolvedBackupConfig,
    ) -> Result<DriverProgress> {
        let name = velero_backup_name(&job.name_any(), started_at);
        let resource = velero_backup_resource();
        let Some(existing) = self
            .get_or_create(&resource, velero_backup_object(job, &name, config))
            .await?
        else {
            return Ok(DriverProgress::InProgress);
        };
        Ok(match velero_progress(&existing, "Backup") {
            DriverProgress::Completed(_) => DriverProgress::Completed(Some(velero_artifact(&existing))),
            other => other,
        })
    }

    async fn restore(
        &self,
        job: &RestoreJob,
        backup: &Backup,
        target: &TypedLocalObjectReference,
    ) -> Result<DriverProgress> {
        let Some(object) = velero_restore_object(job, backup, target) else {
            return Ok(DriverProgress::Failed(format!(
                "Backup {} has no {VELERO_BACKUP_NAME_KEY} driver metadata",
                backup.name_any()
            )));
        };
        let Some(existing) = self.get_or_create(&velero_restore_resource(), object).await? else {
            return Ok(DriverProgress::InProgress);
        };
        Ok(velero_progress(&existing, "Restore"))
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod driver_tests;
