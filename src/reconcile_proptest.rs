//! Property-based tests for the metadata merge and backup naming.

#[cfg(test)]
mod proptest_tests {
    use crate::reconcile::{backup_path, shallow_merge};
    use proptest::prelude::*;
    use serde_json::{Map, Value as JsonValue};
    use std::path::Path;

    fn json_leaf() -> impl Strategy<Value = JsonValue> {
        prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::Bool),
            any::<i64>().prop_map(JsonValue::from),
            "[a-z]{0,8}".prop_map(JsonValue::String),
        ]
    }

    fn json_object() -> impl Strategy<Value = Map<String, JsonValue>> {
        prop::collection::btree_map("[a-e]{1,3}", json_leaf(), 0..8)
            .prop_map(|m| m.into_iter().collect())
    }

    proptest! {
        /// Property: every key of either side survives the merge
        #[test]
        fn merge_keeps_every_key(canonical in json_object(), external in json_object()) {
            let merged = shallow_merge(canonical.clone(), external.clone());
            for key in canonical.keys().chain(external.keys()) {
                prop_assert!(merged.contains_key(key), "lost key '{}'", key);
            }
            prop_assert!(merged.len() <= canonical.len() + external.len());
        }

        /// Property: the external value wins for every key it defines
        #[test]
        fn merge_external_wins(canonical in json_object(), external in json_object()) {
            let merged = shallow_merge(canonical.clone(), external.clone());
            for (key, value) in &external {
                prop_assert_eq!(&merged[key], value);
            }
            for (key, value) in &canonical {
                if !external.contains_key(key) {
                    prop_assert_eq!(&merged[key], value);
                }
            }
        }

        /// Property: merging a side with itself changes nothing
        #[test]
        fn merge_is_idempotent(object in json_object()) {
            prop_assert_eq!(shallow_merge(object.clone(), object.clone()), object);
        }

        /// Property: backups stay next to the original and carry its name
        #[test]
        fn backup_path_is_a_sibling(name in "[a-z_]{1,16}\\.json") {
            let original = Path::new("/nonexistent-dir").join(&name);
            let backup = backup_path(&original);
            prop_assert_eq!(backup.parent(), original.parent());
            let backup_name = backup.file_name().unwrap().to_string_lossy().into_owned();
            let prefix = format!("{}.backup-", name);
            prop_assert!(backup_name.starts_with(&prefix));
        }
    }
}
