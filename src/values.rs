// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Release values manipulation.
//!
//! Values are free-form JSON objects. These helpers merge them, and keep the
//! reserved `_namespace` key in sync with a namespace's prefixed labels.

use crate::constants::NAMESPACE_VALUES_KEY;
use crate::labels::NAMESPACE_VALUES_PREFIX;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Recursively merges `overlay` into `base`. Objects merge key by key; any other
/// overlay value replaces the base value.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Returns `overlay` merged over `base` without mutating either.
#[must_use]
pub fn merged(base: Option<&Value>, overlay: Option<&Value>) -> Option<Value> {
    match (base, overlay) {
        (None, None) => None,
        (Some(b), None) => Some(b.clone()),
        (None, Some(o)) => Some(o.clone()),
        (Some(b), Some(o)) => {
            let mut out = b.clone();
            deep_merge(&mut out, o);
            Some(out)
        }
    }
}

/// Labels with the namespace values prefix, with the prefix stripped.
#[must_use]
pub fn namespace_values(labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    labels
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(NAMESPACE_VALUES_PREFIX)
                .filter(|k| !k.is_empty())
                .map(|k| (k.to_string(), value.clone()))
        })
        .collect()
}

/// Sets the top-level `_namespace` key of `values` to exactly `namespace_labels`.
///
/// Returns the new values when anything changed, `None` otherwise. A release
/// without a `_namespace` key is left alone when there is nothing to propagate.
#[must_use]
pub fn sync_namespace_values(
    values: Option<&Value>,
    namespace_labels: &BTreeMap<String, String>,
) -> Option<Value> {
    let mut root = match values {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let desired: Map<String, Value> = namespace_labels
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();

    match root.get(NAMESPACE_VALUES_KEY) {
        None if desired.is_empty() => return None,
        Some(Value::Object(current)) if *current == desired => return None,
        _ => {}
    }

    root.insert(NAMESPACE_VALUES_KEY.to_string(), Value::Object(desired));
    Some(Value::Object(root))
}

/// Copies the reserved `_namespace` key from `live` into `desired`.
///
/// Emitters that rewrite a release's values use this so they do not undo
/// what the namespace propagator wrote.
#[must_use]
pub fn carry_namespace_values(live: Option<&Value>, desired: Option<Value>) -> Option<Value> {
    let Some(reserved) = live.and_then(|v| v.get(NAMESPACE_VALUES_KEY)) else {
        return desired;
    };
    let mut root = match desired {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    root.insert(NAMESPACE_VALUES_KEY.to_string(), reserved.clone());
    Some(Value::Object(root))
}

#[cfg(test)]
#[path = "values_tests.rs"]
mod values_tests;
