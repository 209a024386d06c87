// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resolves the strategy a `BackupClass` assigns to an application.

use crate::backup_crd::{BackupClass, TypedLocalObjectReference};
use crate::naming::{normalize_application_ref, selector_api_group};
use crate::reconcilers::retry::is_not_found;
use kube::{Api, Client};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("BackupClass {0} not found")]
    ClassNotFound(String),

    #[error("no matching strategy found in BackupClass {class} for application {group}/{kind}")]
    NoMatchingStrategy {
        class: String,
        group: String,
        kind: String,
    },

    #[error("failed to get BackupClass {class}: {source}")]
    Api {
        class: String,
        #[source]
        source: kube::Error,
    },
}

/// Strategy and parameters selected for one application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedBackupConfig {
    pub strategy_ref: TypedLocalObjectReference,
    pub parameters: BTreeMap<String, String>,
}

/// Picks the first strategy of `class` whose application selector matches
/// `(group, kind)` of the normalized `application`.
///
/// # Errors
///
/// Returns [`ResolveError::NoMatchingStrategy`] when no strategy matches.
pub fn match_strategy(
    class: &BackupClass,
    application: &TypedLocalObjectReference,
) -> Result<ResolvedBackupConfig, ResolveError> {
    let application = normalize_application_ref(application);
    let group = application.api_group.unwrap_or_default();
    class
        .spec
        .strategies
        .iter()
        .find(|s| selector_api_group(&s.application) == group && s.application.kind == application.kind)
        .map(|s| ResolvedBackupConfig {
            strategy_ref: s.strategy_ref.clone(),
            parameters: s.parameters.clone(),
        })
        .ok_or_else(|| ResolveError::NoMatchingStrategy {
            class: class.metadata.name.clone().unwrap_or_default(),
            group,
            kind: application.kind,
        })
}

/// Fetches `class_name` and resolves the strategy for `application`.
///
/// # Errors
///
/// Returns a [`ResolveError`] when the class is missing, cannot be read or has
/// no matching strategy.
pub async fn resolve_backup_class(
    client: &Client,
    class_name: &str,
    application: &TypedLocalObjectReference,
) -> Result<ResolvedBackupConfig, ResolveError> {
    let api: Api<BackupClass> = Api::all(client.clone());
    let class = api.get(class_name).await.map_err(|e| {
        if is_not_found(&e) {
            ResolveError::ClassNotFound(class_name.to_string())
        } else {
            ResolveError::Api {
                class: class_name.to_string(),
                source: e,
            }
        }
    })?;
    match_strategy(&class, application)
}

#[cfg(test)]
#[path = "class_resolver_tests.rs"]
mod class_resolver_tests;
