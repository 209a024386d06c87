// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Naming and reference helpers shared by the reconcilers.
//!
//! Artifact names, copy-operation paths, base-path defaults, application
//! reference normalization and tenant namespace ancestry all live here so
//! every emitter computes them the same way.

use crate::backup_crd::{ApplicationSelector, TypedLocalObjectReference};
use crate::constants::{
    APPLICATION_API_GROUP, DEFAULT_GIT_BASE_PATH, KIND_OCI_REPOSITORY, TENANT_ROOT,
};

/// Replaces `.` with `-` so the value is usable in DNS-label names.
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.replace('.', "-")
}

/// Output artifact name of component `component` in variant `variant` of `package_source`.
#[must_use]
pub fn artifact_name(package_source: &str, variant: &str, component: &str) -> String {
    format!(
        "{}-{}-{}",
        sanitize(package_source),
        sanitize(variant),
        sanitize(component)
    )
}

/// Last `/`-separated segment of a path.
#[must_use]
pub fn last_path_segment(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// First `/`-separated segment of a path.
#[must_use]
pub fn first_path_segment(path: &str) -> &str {
    path.trim_start_matches('/').split('/').next().unwrap_or("")
}

/// Resolves the base path inside a source.
///
/// An explicit path is trimmed of slashes, so both `/` and an empty string mean
/// the root. Without one, git sources default to `packages` and OCI sources to
/// the root.
#[must_use]
pub fn resolve_base_path(explicit: Option<&str>, source_kind: &str) -> String {
    match explicit {
        Some(path) => path.trim_matches('/').to_string(),
        None if source_kind == KIND_OCI_REPOSITORY => String::new(),
        None => DEFAULT_GIT_BASE_PATH.to_string(),
    }
}

fn join_source_path(base_path: &str, path: &str) -> String {
    [base_path, path]
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Recursive-glob copy source: `@{alias}/{base}/{path}/**`.
#[must_use]
pub fn source_glob(alias: &str, base_path: &str, path: &str) -> String {
    let full = join_source_path(base_path, path);
    if full.is_empty() {
        format!("@{alias}/**")
    } else {
        format!("@{alias}/{full}/**")
    }
}

/// Single-file copy source: `@{alias}/{base}/{path}`.
#[must_use]
pub fn source_file(alias: &str, base_path: &str, path: &str) -> String {
    let full = join_source_path(base_path, path);
    if full.is_empty() {
        format!("@{alias}")
    } else {
        format!("@{alias}/{full}")
    }
}

/// Defaults an empty or missing `apiGroup` to the application group.
///
/// Normalizing an already normalized reference returns it unchanged.
#[must_use]
pub fn normalize_application_ref(reference: &TypedLocalObjectReference) -> TypedLocalObjectReference {
    let mut normalized = reference.clone();
    if normalized.api_group.as_deref().is_none_or(str::is_empty) {
        normalized.api_group = Some(APPLICATION_API_GROUP.to_string());
    }
    normalized
}

/// Application group a class strategy selects, defaulted like references.
#[must_use]
pub fn selector_api_group(selector: &ApplicationSelector) -> &str {
    match selector.api_group.as_deref() {
        Some(group) if !group.is_empty() => group,
        _ => APPLICATION_API_GROUP,
    }
}

/// Application name of a release: the release name with the definition prefix removed.
///
/// Returns `None` when the release does not carry the prefix.
#[must_use]
pub fn application_name<'a>(release_name: &'a str, prefix: &str) -> Option<&'a str> {
    release_name.strip_prefix(prefix)
}

/// Truncates a label value to the Kubernetes maximum length on a char boundary.
#[must_use]
pub fn truncate_label_value(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_string();
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].trim_end_matches(['-', '_', '.']).to_string()
}

/// Tenants whose members may see objects in `namespace`.
///
/// `tenant-a-prod` yields `tenant-a`, `tenant-a-prod`, `tenant-root`. Namespaces
/// outside the tenant tree yield nothing.
#[must_use]
pub fn tenant_ancestors(namespace: &str, tenant_prefix: &str) -> Vec<String> {
    if !namespace.starts_with(tenant_prefix) {
        return Vec::new();
    }
    let parts: Vec<&str> = namespace.split('-').collect();
    let mut tenants: Vec<String> = (2..=parts.len()).map(|i| parts[..i].join("-")).collect();
    if !tenants.iter().any(|t| t == TENANT_ROOT) {
        tenants.push(TENANT_ROOT.to_string());
    }
    tenants
}

/// Whether a namespace hosts platform system workloads.
#[must_use]
pub fn is_system_namespace(namespace: &str) -> bool {
    namespace == "kube-system" || namespace.starts_with("cozy-")
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod naming_tests;
