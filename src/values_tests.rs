// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::values::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_deep_merge_overlay_wins() {
        let mut base = json!({"a": 1, "nested": {"x": 1, "y": 2}, "list": [1, 2]});
        deep_merge(&mut base, &json!({"a": 2, "nested": {"y": 3, "z": 4}, "list": [3]}));
        assert_eq!(
            base,
            json!({"a": 2, "nested": {"x": 1, "y": 3, "z": 4}, "list": [3]})
        );
    }

    #[test]
    fn test_merged_handles_missing_sides() {
        assert_eq!(merged(None, None), None);
        assert_eq!(merged(Some(&json!({"a": 1})), None), Some(json!({"a": 1})));
        assert_eq!(
            merged(Some(&json!({"a": 1})), Some(&json!({"b": 2}))),
            Some(json!({"a": 1, "b": 2}))
        );
    }

    #[test]
    fn test_namespace_values_strips_prefix() {
        let ns = labels(&[
            ("namespace.cozystack.io/region", "eu1"),
            ("namespace.cozystack.io/", "ignored"),
            ("cozystack.io/system", "true"),
        ]);
        assert_eq!(namespace_values(&ns), labels(&[("region", "eu1")]));
    }

    #[test]
    fn test_sync_namespace_values_sets_key() {
        let updated = sync_namespace_values(
            Some(&json!({"replicas": 2})),
            &labels(&[("region", "eu1")]),
        )
        .unwrap();
        assert_eq!(updated, json!({"replicas": 2, "_namespace": {"region": "eu1"}}));
    }

    #[test]
    fn test_sync_namespace_values_no_diff() {
        let values = json!({"_namespace": {"region": "eu1"}});
        assert!(sync_namespace_values(Some(&values), &labels(&[("region", "eu1")])).is_none());
    }

    #[test]
    fn test_sync_namespace_values_removes_stale_keys() {
        let values = json!({"_namespace": {"region": "eu1", "zone": "a"}, "x": 1});
        let updated = sync_namespace_values(Some(&values), &labels(&[("zone", "b")])).unwrap();
        assert_eq!(updated, json!({"_namespace": {"zone": "b"}, "x": 1}));
    }

    #[test]
    fn test_sync_namespace_values_clears_when_labels_removed() {
        let values = json!({"_namespace": {"region": "eu1"}});
        let updated = sync_namespace_values(Some(&values), &BTreeMap::new()).unwrap();
        assert_eq!(updated, json!({"_namespace": {}}));
    }

    #[test]
    fn test_sync_namespace_values_nothing_to_do() {
        assert!(sync_namespace_values(None, &BTreeMap::new()).is_none());
        assert!(sync_namespace_values(Some(&json!({"a": 1})), &BTreeMap::new()).is_none());
    }

    #[test]
    fn test_carry_namespace_values() {
        let live = json!({"replicas": 1, "_namespace": {"region": "eu1"}});
        let carried = carry_namespace_values(Some(&live), Some(json!({"replicas": 3})));
        assert_eq!(
            carried,
            Some(json!({"replicas": 3, "_namespace": {"region": "eu1"}}))
        );
        assert_eq!(
            carry_namespace_values(Some(&live), None),
            Some(json!({"_namespace": {"region": "eu1"}}))
        );
        assert_eq!(carry_namespace_values(None, Some(json!({"a": 1}))), Some(json!({"a": 1})));
    }
}
