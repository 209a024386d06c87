// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `backupjob.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::backup_crd::{BackupJobSpec, TypedLocalObjectReference};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn job(plan: Option<&str>) -> BackupJob {
        let mut job = BackupJob::new(
            "nightly-28928340",
            BackupJobSpec {
                application_ref: TypedLocalObjectReference {
                    api_group: None,
                    kind: "VirtualMachine".into(),
                    name: "vm1".into(),
                },
                backup_class_name: "velero".into(),
                plan_ref: plan.map(|p| LocalObjectReference { name: p.into() }),
            },
        );
        job.metadata.namespace = Some("tenant-a".into());
        job.metadata.uid = Some("job-uid".into());
        job
    }

    fn config() -> ResolvedBackupConfig {
        ResolvedBackupConfig {
            strategy_ref: TypedLocalObjectReference {
                api_group: Some("strategy.backups.cozystack.io".into()),
                kind: "Velero".into(),
                name: "vm".into(),
            },
            parameters: BTreeMap::new(),
        }
    }

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, second).unwrap()
    }

    #[test]
    fn test_mark_running_only_once() {
        let mut status = BackupJobStatus::default();
        let (started, changed) = mark_running(&mut status, at(7));
        assert!(changed);
        assert_eq!(started, at(7));
        assert_eq!(status.phase, JobPhase::Running);
        assert_eq!(status.started_at.as_deref(), Some("2025-03-04T05:06:07Z"));

        let (started, changed) = mark_running(&mut status, at(30));
        assert!(!changed);
        assert_eq!(started, at(7));
    }

    #[test]
    fn test_terminal_status() {
        let mut status = BackupJobStatus::default();
        mark_failed(&mut status, "bucket unreachable", at(9), Some(1));
        assert_eq!(status.phase, JobPhase::Failed);
        assert!(status.phase.is_terminal());
        assert_eq!(status.message.as_deref(), Some("bucket unreachable"));
        assert_eq!(status.conditions[0].status, "False");
        assert_eq!(status.conditions[0].reason.as_deref(), Some("BackupFailed"));

        let mut status = BackupJobStatus::default();
        mark_succeeded(&mut status, "nightly-28928340-backup", at(9), Some(1));
        assert_eq!(status.phase, JobPhase::Succeeded);
        assert_eq!(status.backup_ref.as_ref().map(|r| r.name.as_str()), Some("nightly-28928340-backup"));
        assert_eq!(status.completed_at.as_deref(), Some("2025-03-04T05:06:09Z"));
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].status, "True");
    }

    #[test]
    fn test_build_backup_from_artifact() {
        let artifact = DriverArtifact {
            uri: "velero://tenant-a/nightly-velero-x".into(),
            taken_at: Some("2025-03-04T05:06:08Z".into()),
            metadata: BTreeMap::from([("velero.io/backup-name".to_string(), "nightly-velero-x".to_string())]),
        };
        let backup = build_backup(&job(Some("nightly")), &config(), Some(&artifact), at(7));
        assert_eq!(backup.name_any(), "nightly-28928340-backup");
        assert_eq!(backup.namespace().as_deref(), Some("tenant-a"));
        assert_eq!(backup.spec.application_ref.api_group.as_deref(), Some("apps.cozystack.io"));
        assert_eq!(backup.spec.taken_at, "2025-03-04T05:06:08Z");
        assert_eq!(backup.spec.driver_metadata["velero.io/backup-name"], "nightly-velero-x");
        assert_eq!(backup.spec.plan_ref.as_ref().map(|p| p.name.as_str()), Some("nightly"));
        let owner = &backup.owner_references()[0];
        assert_eq!(owner.kind, "BackupJob");
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn test_build_backup_without_artifact_uses_start_time() {
        let backup = build_backup(&job(None), &config(), None, at(7));
        assert_eq!(backup.spec.taken_at, "2025-03-04T05:06:07Z");
        assert!(backup.spec.driver_metadata.is_empty());
        assert!(backup.spec.plan_ref.is_none());
    }

    #[test]
    fn test_resolve_failure_reason_per_variant() {
        assert_eq!(
            resolve_failure_reason(&ResolveError::ClassNotFound("velero".into())),
            Some(REASON_BACKUP_CLASS_NOT_FOUND)
        );
        assert_eq!(
            resolve_failure_reason(&ResolveError::NoMatchingStrategy {
                class: "velero".into(),
                group: "apps.cozystack.io".into(),
                kind: "Postgres".into(),
            }),
            Some(REASON_NO_MATCHING_STRATEGY)
        );

        let api = ResolveError::Api {
            class: "velero".into(),
            source: kube::Error::Api(
                kube::error::ErrorResponse {
                    status: Some(kube::core::response::StatusSummary::Failure),
                    message: "etcdserver: request timed out".to_string(),
                    reason: "InternalError".to_string(),
                    code: 500,
                    metadata: None,
                    details: None,
                }
                .into(),
            ),
        };
        assert_eq!(resolve_failure_reason(&api), None);
    }
}
