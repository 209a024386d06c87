// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `driver.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::backup_crd::{BackupJobSpec, BackupSpec, LocalObjectReference, RestoreJobSpec};
    use chrono::TimeZone;

    fn vm_ref(name: &str) -> TypedLocalObjectReference {
        TypedLocalObjectReference {
            api_group: Some("apps.cozystack.io".into()),
            kind: "VirtualMachine".into(),
            name: name.into(),
        }
    }

    fn job() -> BackupJob {
        let mut job = BackupJob::new(
            "nightly",
            BackupJobSpec {
                application_ref: vm_ref("vm1"),
                backup_class_name: "velero".into(),
                plan_ref: None,
            },
        );
        job.metadata.namespace = Some("tenant-a".into());
        job.metadata.uid = Some("job-uid".into());
        job
    }

    fn config(parameters: &[(&str, &str)]) -> ResolvedBackupConfig {
        ResolvedBackupConfig {
            strategy_ref: TypedLocalObjectReference {
                api_group: Some("strategy.backups.cozystack.io".into()),
                kind: "Velero".into(),
                name: "vm".into(),
            },
            parameters: parameters
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    fn velero_backup(status: Value) -> DynamicObject {
        let mut object = DynamicObject::new("nightly-velero-2025-03-04-05-06-07", &velero_backup_resource())
            .within("tenant-a");
        object.data = json!({ "status": status });
        object
    }

    #[test]
    fn test_backup_name_embeds_start_time() {
        let started = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(
            velero_backup_name("nightly", started),
            "nightly-velero-2025-03-04-05-06-07"
        );
        assert_eq!(velero_restore_name("restore-1"), "restore-1-velero-restore");
    }

    #[test]
    fn test_backup_object() {
        let object = velero_backup_object(
            &job(),
            "nightly-velero-x",
            &config(&[("backupStorageLocationName", "s3"), ("ttl", "720h")]),
        );
        assert_eq!(object.metadata.namespace.as_deref(), Some("tenant-a"));
        let owner = &object.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, "BackupJob");
        assert_eq!(owner.uid, "job-uid");
        assert_eq!(
            object.data["spec"],
            json!({
                "includedNamespaces": ["tenant-a"],
                "labelSelector": {"matchLabels": {
                    "apps.cozystack.io/application.kind": "VirtualMachine",
                    "apps.cozystack.io/application.name": "vm1"
                }},
                "storageLocation": "s3",
                "ttl": "720h"
            })
        );
    }

    #[test]
    fn test_backup_object_default_location() {
        let object = velero_backup_object(&job(), "n", &config(&[]));
        assert_eq!(object.data["spec"]["storageLocation"], "default");
        assert!(object.data["spec"].get("ttl").is_none());
    }

    #[test]
    fn test_progress_mapping() {
        assert_eq!(velero_progress(&velero_backup(json!({})), "Backup"), DriverProgress::InProgress);
        assert_eq!(
            velero_progress(&velero_backup(json!({"phase": "InProgress"})), "Backup"),
            DriverProgress::InProgress
        );
        assert_eq!(
            velero_progress(&velero_backup(json!({"phase": "Completed"})), "Backup"),
            DriverProgress::Completed(None)
        );
        assert_eq!(
            velero_progress(&velero_backup(json!({"phase": "PartiallyFailed"})), "Backup"),
            DriverProgress::Failed("Velero Backup failed with phase: PartiallyFailed".into())
        );
        assert_eq!(
            velero_progress(
                &velero_backup(json!({"phase": "Failed", "failureReason": "bucket unreachable"})),
                "Backup"
            ),
            DriverProgress::Failed("bucket unreachable".into())
        );
    }

    #[test]
    fn test_artifact() {
        let object = velero_backup(json!({"phase": "Completed", "startTimestamp": "2025-03-04T05:06:09Z"}));
        let artifact = velero_artifact(&object);
        assert_eq!(artifact.uri, "velero://tenant-a/nightly-velero-2025-03-04-05-06-07");
        assert_eq!(artifact.taken_at.as_deref(), Some("2025-03-04T05:06:09Z"));
        assert_eq!(
            artifact.metadata[VELERO_BACKUP_NAME_KEY],
            "nightly-velero-2025-03-04-05-06-07"
        );
        assert_eq!(artifact.metadata[VELERO_BACKUP_NAMESPACE_KEY], "tenant-a");
    }

    #[test]
    fn test_restore_object_requires_velero_metadata() {
        let mut restore = RestoreJob::new(
            "restore-1",
            RestoreJobSpec {
                backup_ref: LocalObjectReference { name: "nightly-backup".into() },
                target_application_ref: None,
            },
        );
        restore.metadata.namespace = Some("tenant-a".into());
        restore.metadata.uid = Some("restore-uid".into());

        let mut backup = Backup::new(
            "nightly-backup",
            BackupSpec {
                application_ref: vm_ref("vm1"),
                strategy_ref: config(&[]).strategy_ref,
                taken_at: "2025-03-04T05:06:09Z".into(),
                driver_metadata: BTreeMap::new(),
                plan_ref: None,
            },
        );
        assert!(velero_restore_object(&restore, &backup, &vm_ref("vm1")).is_none());

        backup
            .spec
            .driver_metadata
            .insert(VELERO_BACKUP_NAME_KEY.into(), "nightly-velero-x".into());
        let object = velero_restore_object(&restore, &backup, &vm_ref("vm2")).unwrap();
        assert_eq!(object.metadata.name.as_deref(), Some("restore-1-velero-restore"));
        assert_eq!(object.data["spec"]["backupName"], "nightly-velero-x");
        assert_eq!(
            object.data["spec"]["labelSelector"]["matchLabels"]["apps.cozystack.io/application.name"],
            "vm2"
        );
    }

    #[tokio::test]
    async fn test_driver_lookup() {
        let client = Client::try_from(kube::Config::new("http://127.0.0.1:1".parse().unwrap())).unwrap();
        assert_eq!(driver_for("Velero", &client).map(|d| d.kind()), Some("Velero"));
        assert!(driver_for("Job", &client).is_none());
    }
}
