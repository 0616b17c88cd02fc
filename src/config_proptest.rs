//! Property-based tests for include normalization.
//!
//! These tests use proptest to generate random include declarations and
//! verify that the three accepted encodings always normalize identically.

#[cfg(test)]
mod proptest_tests {
    use crate::config::{parse_includes, IncludeDirective};
    use proptest::prelude::*;
    use serde_json::json;

    fn file_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,12}(/[a-z][a-z0-9_-]{0,8}){0,2}\\.(yml|yaml|json|jsonnet|tpl)"
    }

    proptest! {
        /// Property: a bare string equals a record with only `file` set
        #[test]
        fn bare_string_equals_minimal_record(file in file_name()) {
            let bare = parse_includes(&json!(file)).unwrap();
            let record = parse_includes(&json!({"file": file})).unwrap();
            prop_assert_eq!(bare, record);
        }

        /// Property: a single entry equals a one-element list of it
        #[test]
        fn single_entry_equals_singleton_list(file in file_name()) {
            let single = parse_includes(&json!({"file": file})).unwrap();
            let list = parse_includes(&json!([file])).unwrap();
            prop_assert_eq!(single, list);
        }

        /// Property: defaults never produce an empty name or extension, and
        /// the output file lives directly in the component directory
        #[test]
        fn defaults_are_usable(file in file_name()) {
            let include = IncludeDirective::from_file(&file);
            prop_assert!(!include.dest_name.is_empty());
            prop_assert_eq!(include.dest_ext.as_str(), "yaml");
            prop_assert!(!include.dest_name.contains('/'));
            let path = include.output_path("component");
            prop_assert_eq!(path.parent().unwrap(), std::path::Path::new("component"));
        }

        /// Property: list order is preserved
        #[test]
        fn list_order_preserved(files in prop::collection::vec(file_name(), 0..6)) {
            let parsed = parse_includes(&json!(files)).unwrap();
            let sources: Vec<String> = parsed.into_iter().map(|i| i.source_file).collect();
            prop_assert_eq!(sources, files);
        }
    }
}
