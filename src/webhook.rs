// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `BackupJob` validating admission webhook.
//!
//! Creates and updates must carry a non-blank `spec.backupClassName`, and once
//! set the class can never change. Deletes and connects are always allowed.

use crate::backup_crd::BackupJob;
use crate::constants::KIND_BACKUP_JOB;
use crate::metrics::record_admission;
use axum::Json;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use kube::ResourceExt;
use tracing::{debug, error, info};

/// Why a `BackupJob` was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("backupClassName is required and cannot be empty")]
    EmptyBackupClass,

    #[error("backupClassName is immutable and cannot be changed from {from:?} to {to:?}")]
    BackupClassChanged { from: String, to: String },

    #[error("expected a BackupJob in the admission request")]
    MissingObject,
}

/// Validates one admission operation on a `BackupJob`.
///
/// # Errors
///
/// Returns the first rule the new object violates.
pub fn validate_backup_job(
    operation: &Operation,
    old: Option<&BackupJob>,
    new: Option<&BackupJob>,
) -> Result<(), ValidationError> {
    match operation {
        Operation::Create | Operation::Update => {}
        _ => return Ok(()),
    }
    let job = new.ok_or(ValidationError::MissingObject)?;
    if job.spec.backup_class_name.trim().is_empty() {
        return Err(ValidationError::EmptyBackupClass);
    }
    if let Some(old) = old {
        let previous = &old.spec.backup_class_name;
        if !previous.is_empty() && *previous != job.spec.backup_class_name {
            return Err(ValidationError::BackupClassChanged {
                from: previous.clone(),
                to: job.spec.backup_class_name.clone(),
            });
        }
    }
    Ok(())
}

/// Builds the admission response for one request.
#[must_use]
pub fn review_backup_job(request: &AdmissionRequest<BackupJob>) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    match validate_backup_job(
        &request.operation,
        request.old_object.as_ref(),
        request.object.as_ref(),
    ) {
        Ok(()) => {
            debug!(uid = %request.uid, name = %request.name, "BackupJob admitted");
            record_admission(KIND_BACKUP_JOB, true);
            response
        }
        Err(e) => {
            info!(
                uid = %request.uid,
                name = %request.name,
                namespace = ?request.namespace,
                reason = %e,
                "BackupJob rejected"
            );
            record_admission(KIND_BACKUP_JOB, false);
            response.deny(e.to_string())
        }
    }
}

/// Axum handler for `POST /validate-backupjob`.
pub async fn validate_backup_job_handler(
    Json(body): Json<AdmissionReview<BackupJob>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<BackupJob> = match body.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    if let Some(job) = &request.object {
        debug!(name = %job.name_any(), operation = ?request.operation, "Validating BackupJob");
    }
    Json(review_backup_job(&request).into_review())
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod webhook_tests;
