// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backup orchestration.
//!
//! ## Module Structure
//!
//! - [`class_resolver`] - `BackupClass` strategy selection
//! - [`driver`] - Driver trait and the Velero driver
//! - [`backupjob`] - `BackupJob` lifecycle
//! - [`restorejob`] - `RestoreJob` lifecycle
//! - [`plan`] - `Plan` scheduler

pub mod backupjob;
pub mod class_resolver;
pub mod driver;
pub mod plan;
pub mod restorejob;

pub use backupjob::reconcile_backup_job;
pub use plan::reconcile_plan;
pub use restorejob::reconcile_restore_job;

use chrono::{DateTime, SecondsFormat, Utc};

/// RFC3339 timestamp with second precision, as stored in job status.
#[must_use]
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses a stored RFC3339 timestamp.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
