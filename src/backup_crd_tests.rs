// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `backup_crd.rs`

#[cfg(test)]
mod tests {
    use crate::backup_crd::*;
    use kube::CustomResourceExt;
    use serde_json::json;

    #[test]
    fn test_job_phase_empty_string_round_trips() {
        let status: BackupJobStatus = serde_json::from_value(json!({"phase": ""})).unwrap();
        assert_eq!(status.phase, JobPhase::Empty);

        let status: BackupJobStatus = serde_json::from_value(json!({})).unwrap();
        assert_eq!(status.phase, JobPhase::Empty);
        assert_eq!(serde_json::to_value(status).unwrap()["phase"], json!(""));
    }

    #[test]
    fn test_job_phase_terminal() {
        assert!(JobPhase::Succeeded.is_terminal());
        assert!(JobPhase::Failed.is_terminal());
        assert!(!JobPhase::Running.is_terminal());
        assert!(!JobPhase::Pending.is_terminal());
        assert!(!JobPhase::Empty.is_terminal());
    }

    #[test]
    fn test_schedule_type_lowercase() {
        let schedule: PlanSchedule =
            serde_json::from_value(json!({"type": "interval", "value": "6h"})).unwrap();
        assert_eq!(schedule.r#type, ScheduleType::Interval);
        let schedule: PlanSchedule = serde_json::from_value(json!({"value": "0 2 * * *"})).unwrap();
        assert_eq!(schedule.r#type, ScheduleType::Cron);
    }

    #[test]
    fn test_backup_class_strategy_parameters() {
        let spec: BackupClassSpec = serde_json::from_value(json!({
            "strategies": [{
                "strategyRef": {"apiGroup": "strategy.backups.cozystack.io", "kind": "Velero", "name": "vm"},
                "application": {"kind": "VirtualMachine"},
                "parameters": {"backupStorageLocationName": "default"}
            }]
        }))
        .unwrap();
        let strategy = &spec.strategies[0];
        assert!(strategy.application.api_group.is_none());
        assert_eq!(strategy.parameters["backupStorageLocationName"], "default");
    }

    #[test]
    fn test_scopes() {
        assert_eq!(BackupClass::crd().spec.scope, "Cluster");
        assert_eq!(BackupJob::crd().spec.scope, "Namespaced");
        assert_eq!(Plan::crd().spec.scope, "Namespaced");
        assert_eq!(Backup::crd().spec.scope, "Namespaced");
        assert_eq!(RestoreJob::crd().spec.scope, "Namespaced");
    }
}
