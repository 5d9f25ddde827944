//! Layering dynamic per-table overrides on top of static configuration.
//!
//! An override document is a JSON object in the shape of
//! [`TableScalingConfig`] with any subset of fields present. Objects merge
//! key by key; every other value replaces the static one.

use serde_json::Value;

use crate::config::TableScalingConfig;
use crate::error::ConfigResult;

/// Merge a JSON override document into `base`, returning a new value.
pub fn merge_override(base: &TableScalingConfig, document: &str) -> ConfigResult<TableScalingConfig> {
    let overlay: Value = serde_json::from_str(document)?;
    let mut merged = serde_json::to_value(base)?;
    merge_values(&mut merged, overlay);
    Ok(serde_json::from_value(merged)?)
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_values(existing, value)
                    }
                    _ => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::ScaleUnit;

    #[test]
    fn empty_override_keeps_base() {
        let base = TableScalingConfig::default();
        assert_eq!(merge_override(&base, "{}").unwrap(), base);
    }

    #[test]
    fn nested_fields_merge_without_clobbering_siblings() {
        let mut base = TableScalingConfig::default();
        base.reads.min_provisioned = Some(5);
        base.reads.increase_unit = ScaleUnit::Units;

        let merged = merge_override(
            &base,
            r#"{"reads": {"max_provisioned": 400}, "always_decrease_rw_together": true}"#,
        )
        .unwrap();

        assert_eq!(merged.reads.min_provisioned, Some(5));
        assert_eq!(merged.reads.max_provisioned, Some(400));
        assert_eq!(merged.reads.increase_unit, ScaleUnit::Units);
        assert!(merged.always_decrease_rw_together);
        // The base value is never touched.
        assert!(!base.always_decrease_rw_together);
    }

    #[test]
    fn scale_tables_replace_wholesale() {
        let merged = merge_override(
            &TableScalingConfig::default(),
            r#"{"writes": {"decrease_consumed_scale": {"10": 50, "20": 25}}}"#,
        )
        .unwrap();
        let table = merged.writes.decrease_consumed_scale.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.steps()[0].threshold, 10.0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let base = TableScalingConfig::default();
        let merged = merge_override(&base, r#"{"sns_topic_arn": "arn:aws:sns:x"}"#).unwrap();
        assert_eq!(merged, base);
    }

    #[test]
    fn malformed_document_is_an_error() {
        let base = TableScalingConfig::default();
        assert!(merge_override(&base, "{not json").is_err());
        assert!(merge_override(&base, r#"{"reads": {"increase_unit": "bogus"}}"#).is_err());
    }
}
