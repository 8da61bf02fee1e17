//! Run configuration merging
//!
//! Merges configuration documents with proper precedence:
//! 1. /etc/harden/harden.yml (base)
//! 2. /etc/harden/harden.d/*.yml (sorted alphabetically)
//!
//! Documents are merged as raw YAML before deserialization so a drop-in only
//! overrides the keys it actually sets. A document may carry a top-level
//! `merge_how` key selecting how its lists combine with earlier ones.

use super::RunConfig;
use serde_yaml::Value;
use tracing::debug;

/// Key a document uses to pick its list merge strategy
const MERGE_HOW_KEY: &str = "merge_how";

/// Merge strategy for list fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMergeStrategy {
    /// Append new items to existing list
    #[default]
    Append,
    /// Prepend new items to existing list
    Prepend,
    /// Replace entire list
    Replace,
    /// No change (keep original)
    NoReplace,
}

impl ListMergeStrategy {
    /// Parse from string (as used in merge_how)
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "append" => Self::Append,
            "prepend" => Self::Prepend,
            "replace" => Self::Replace,
            "no_replace" | "noreplace" => Self::NoReplace,
            _ => Self::Append,
        }
    }

    /// Read the strategy a document asks for
    fn of_document(doc: &Value) -> Self {
        doc.get(MERGE_HOW_KEY)
            .and_then(Value::as_str)
            .map(Self::parse)
            .unwrap_or_default()
    }
}

/// Merge two YAML values recursively
pub fn merge_yaml_values(base: &Value, overlay: &Value, list_strategy: ListMergeStrategy) -> Value {
    match (base, overlay) {
        // Both are mappings - merge recursively
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut result = base_map.clone();

            for (key, overlay_value) in overlay_map {
                if let Some(base_value) = result.get(key) {
                    let merged = merge_yaml_values(base_value, overlay_value, list_strategy);
                    result.insert(key.clone(), merged);
                } else {
                    result.insert(key.clone(), overlay_value.clone());
                }
            }

            Value::Mapping(result)
        }

        // Both are sequences - merge according to strategy
        (Value::Sequence(base_seq), Value::Sequence(overlay_seq)) => match list_strategy {
            ListMergeStrategy::Append => {
                let mut result = base_seq.clone();
                for item in overlay_seq {
                    if !result.contains(item) {
                        result.push(item.clone());
                    }
                }
                Value::Sequence(result)
            }
            ListMergeStrategy::Prepend => {
                let mut result = overlay_seq.clone();
                for item in base_seq {
                    if !result.contains(item) {
                        result.push(item.clone());
                    }
                }
                Value::Sequence(result)
            }
            ListMergeStrategy::Replace => Value::Sequence(overlay_seq.clone()),
            ListMergeStrategy::NoReplace => Value::Sequence(base_seq.clone()),
        },

        // Overlay is null - keep base value
        (base_value, Value::Null) => base_value.clone(),

        // All other cases - overlay wins
        (_, overlay_value) => overlay_value.clone(),
    }
}

/// Merge raw YAML documents in order (later documents have higher priority)
pub fn merge_documents(docs: &[Value]) -> Value {
    let mut result = Value::Null;
    for doc in docs {
        debug!("Merging configuration document");
        let strategy = ListMergeStrategy::of_document(doc);
        result = merge_yaml_values(&result, doc, strategy);
    }

    if let Value::Mapping(map) = &mut result {
        map.remove(MERGE_HOW_KEY);
    }
    result
}

/// Deserialize a merged document, treating an empty document as defaults
pub fn config_from_value(value: Value) -> Result<RunConfig, serde_yaml::Error> {
    match value {
        Value::Null => Ok(RunConfig::default()),
        other => serde_yaml::from_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_yaml_strings(yaml_strings: &[String]) -> Result<RunConfig, serde_yaml::Error> {
        let docs: Result<Vec<Value>, _> = yaml_strings
            .iter()
            .filter(|s| !s.trim().is_empty())
            .map(|s| serde_yaml::from_str::<Value>(s))
            .collect();

        config_from_value(merge_documents(&docs?))
    }

    #[test]
    fn test_merge_scalar_overlay_wins() {
        let merged = merge_yaml_strings(&[
            "sshd_port: 22".to_string(),
            "sshd_port: 2222".to_string(),
        ])
        .unwrap();
        assert_eq!(merged.sshd_port, 2222);
    }

    #[test]
    fn test_merge_keeps_base_when_overlay_missing() {
        let merged = merge_yaml_strings(&[
            "timezone_server: Europe/Berlin\ndisable_ipv6: true".to_string(),
            "reboot_box: true".to_string(),
        ])
        .unwrap();

        // A drop-in that does not mention a key must not reset it to its default
        assert_eq!(merged.timezone_server, "Europe/Berlin");
        assert!(merged.disable_ipv6);
        assert!(merged.reboot_box);
    }

    #[test]
    fn test_merge_packages_append_no_duplicates() {
        let merged = merge_yaml_strings(&[
            "install_packages: [curl, git]".to_string(),
            "install_packages: [git, htop]".to_string(),
        ])
        .unwrap();
        assert_eq!(merged.install_packages, vec!["curl", "git", "htop"]);
    }

    #[test]
    fn test_merge_how_replace() {
        let merged = merge_yaml_strings(&[
            "install_packages: [curl, git]".to_string(),
            "merge_how: replace\ninstall_packages: [htop]".to_string(),
        ])
        .unwrap();
        assert_eq!(merged.install_packages, vec!["htop"]);
    }

    #[test]
    fn test_merge_null_keeps_base() {
        let merged = merge_yaml_strings(&[
            "timezone_server: Asia/Tokyo".to_string(),
            "timezone_server: ~".to_string(),
        ])
        .unwrap();
        assert_eq!(merged.timezone_server, "Asia/Tokyo");
    }

    #[test]
    fn test_list_merge_strategy_parse() {
        assert_eq!(
            ListMergeStrategy::parse("append"),
            ListMergeStrategy::Append
        );
        assert_eq!(
            ListMergeStrategy::parse("PREPEND"),
            ListMergeStrategy::Prepend
        );
        assert_eq!(
            ListMergeStrategy::parse("replace"),
            ListMergeStrategy::Replace
        );
        assert_eq!(
            ListMergeStrategy::parse("no_replace"),
            ListMergeStrategy::NoReplace
        );
        assert_eq!(ListMergeStrategy::parse("bogus"), ListMergeStrategy::Append);
    }

    #[test]
    fn test_merge_yaml_values_prepend() {
        let base = serde_yaml::from_str::<Value>("[1, 2]").unwrap();
        let overlay = serde_yaml::from_str::<Value>("[3, 1]").unwrap();

        let merged = merge_yaml_values(&base, &overlay, ListMergeStrategy::Prepend);
        let seq = merged.as_sequence().unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq[0], Value::from(3));
    }

    #[test]
    fn test_merge_empty_documents() {
        let merged = merge_yaml_strings(&[]).unwrap();
        assert_eq!(merged, RunConfig::default());
    }
}
