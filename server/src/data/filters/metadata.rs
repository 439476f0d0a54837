//! Metadata predicate builder
//!
//! Turns dotted metadata keys (`metadata.image.name`) into a JSONB containment
//! predicate. The predicate text is fixed and the nested object travels as a
//! single bound JSON parameter.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{Scalar, SqlParams, SqlValue};

/// Prefix every metadata key carries
pub const METADATA_PREFIX: &str = "metadata.";

/// Containment predicate against the samples metadata column
pub const METADATA_PREDICATE: &str = "metadata @> %s";

/// Split a dotted key into its path segments after the prefix
pub fn metadata_path(dotted_key: &str) -> Result<Vec<&str>, FilterError> {
    let rest = dotted_key.strip_prefix(METADATA_PREFIX).ok_or_else(|| {
        FilterError::invalid(format!(
            "metadata key '{}' must start with '{}'",
            dotted_key, METADATA_PREFIX
        ))
    })?;

    let segments: Vec<&str> = rest.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(FilterError::invalid(format!(
            "metadata key '{}' has an empty path segment",
            dotted_key
        )));
    }
    Ok(segments)
}

/// Build `{s1: {s2: {... {sk: value}}}}` for a dotted key
pub fn nested_object(dotted_key: &str, value: &Scalar) -> Result<Value, FilterError> {
    let segments = metadata_path(dotted_key)?;
    Ok(segments
        .iter()
        .rev()
        .fold(value.to_json(), |inner, segment| {
            let mut map = Map::new();
            map.insert((*segment).to_string(), inner);
            Value::Object(map)
        }))
}

/// Predicate for a single metadata leaf; binds exactly one JSON parameter
pub fn build_predicate(
    dotted_key: &str,
    value: &Scalar,
    params: &mut SqlParams,
) -> Result<String, FilterError> {
    let object = nested_object(dotted_key, value)?;
    params.bind(SqlValue::Json(object));
    Ok(METADATA_PREDICATE.to_string())
}

/// One predicate for a whole metaquery: every key is merged into a single
/// nested object. Returns `None` when the metaquery is empty.
pub fn build_merged_predicate(
    metaquery: &BTreeMap<String, Scalar>,
    params: &mut SqlParams,
) -> Result<Option<String>, FilterError> {
    if metaquery.is_empty() {
        return Ok(None);
    }

    let mut merged = Value::Object(Map::new());
    for (key, value) in metaquery {
        let object = nested_object(key, value)?;
        deep_merge(&mut merged, object, key)?;
    }

    params.bind(SqlValue::Json(merged));
    Ok(Some(METADATA_PREDICATE.to_string()))
}

fn deep_merge(target: &mut Value, source: Value, key: &str) -> Result<(), FilterError> {
    let (Value::Object(target_map), Value::Object(source_map)) = (target, source) else {
        return Err(FilterError::invalid(format!(
            "metadata key '{}' conflicts with another key",
            key
        )));
    };

    for (segment, value) in source_map {
        match target_map.get_mut(&segment) {
            Some(existing) => deep_merge(existing, value, key)?,
            None => {
                target_map.insert(segment, value);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_object_for_dotted_key() {
        let mut params = SqlParams::default();
        let sql = build_predicate("metadata.image.name", &Scalar::from("cirros"), &mut params)
            .unwrap();

        assert_eq!(sql, "metadata @> %s");
        assert_eq!(
            params.values,
            vec![SqlValue::Json(json!({"image": {"name": "cirros"}}))]
        );
    }

    #[test]
    fn single_segment_key() {
        let object = nested_object("metadata.status", &Scalar::from("active")).unwrap();
        assert_eq!(object, json!({"status": "active"}));
    }

    #[test]
    fn values_pass_through_unchanged() {
        let object = nested_object("metadata.memory_mb", &Scalar::Int(512)).unwrap();
        assert_eq!(object, json!({"memory_mb": 512}));
        let object = nested_object("metadata.public", &Scalar::Bool(true)).unwrap();
        assert_eq!(object, json!({"public": true}));
    }

    #[test]
    fn key_without_segments_is_invalid() {
        assert!(matches!(
            nested_object("metadata.", &Scalar::Int(1)),
            Err(FilterError::InvalidFilter(_))
        ));
        assert!(matches!(
            nested_object("metadata", &Scalar::Int(1)),
            Err(FilterError::InvalidFilter(_))
        ));
        assert!(matches!(
            nested_object("metadata.a..b", &Scalar::Int(1)),
            Err(FilterError::InvalidFilter(_))
        ));
    }

    #[test]
    fn merged_predicate_binds_one_object() {
        let metaquery = BTreeMap::from([
            ("metadata.status".to_string(), Scalar::from("active")),
            ("metadata.memory_mb".to_string(), Scalar::Int(512)),
            ("metadata.image.name".to_string(), Scalar::from("cirros")),
            ("metadata.image.id".to_string(), Scalar::from("abc")),
        ]);
        let mut params = SqlParams::default();
        let sql = build_merged_predicate(&metaquery, &mut params).unwrap();

        assert_eq!(sql.as_deref(), Some("metadata @> %s"));
        assert_eq!(
            params.values,
            vec![SqlValue::Json(json!({
                "image": {"id": "abc", "name": "cirros"},
                "memory_mb": 512,
                "status": "active"
            }))]
        );
    }

    #[test]
    fn merged_predicate_rejects_conflicting_keys() {
        let metaquery = BTreeMap::from([
            ("metadata.image".to_string(), Scalar::from("cirros")),
            ("metadata.image.name".to_string(), Scalar::from("cirros")),
        ]);
        let mut params = SqlParams::default();
        assert!(build_merged_predicate(&metaquery, &mut params).is_err());
    }

    #[test]
    fn empty_metaquery_emits_nothing() {
        let mut params = SqlParams::default();
        let sql = build_merged_predicate(&BTreeMap::new(), &mut params).unwrap();
        assert!(sql.is_none());
        assert!(params.values.is_empty());
    }
}
