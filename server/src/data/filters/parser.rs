//! Filter parsing
//!
//! Parses the JSON wire form of complex queries into expression trees,
//! validating fields against the target's allow-list.

use serde_json::{Map, Value};

use super::builder::{OrderBy, QueryTarget, SortDirection};
use super::error::FilterError;
use super::metadata::METADATA_PREFIX;
use super::types::{BoolKind, FilterExpression, Operator, Scalar};
use crate::core::constants::{QUERY_DEFAULT_MAX_FILTER_JSON_BYTES, QUERY_MAX_FILTER_DEPTH};

/// Alias accepted for sample metadata keys
const RESOURCE_METADATA_PREFIX: &str = "resource_metadata.";

/// Parse a filter tree using the default size limit
pub fn parse_filter(json_str: &str, target: QueryTarget) -> Result<FilterExpression, FilterError> {
    parse_filter_with_limit(json_str, target, QUERY_DEFAULT_MAX_FILTER_JSON_BYTES)
}

/// Parse a filter tree from JSON.
///
/// Validates JSON size, node shapes, operators and field names.
pub fn parse_filter_with_limit(
    json_str: &str,
    target: QueryTarget,
    max_bytes: usize,
) -> Result<FilterExpression, FilterError> {
    if json_str.len() > max_bytes {
        return Err(FilterError::invalid(format!(
            "filter JSON exceeds maximum size of {} bytes",
            max_bytes
        )));
    }

    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| FilterError::invalid(format!("malformed filter JSON: {}", e)))?;
    parse_filter_value(&value, target)
}

/// Parse an already decoded filter tree
pub fn parse_filter_value(
    value: &Value,
    target: QueryTarget,
) -> Result<FilterExpression, FilterError> {
    parse_node(value, target, 0)
}

fn parse_node(value: &Value, target: QueryTarget, depth: usize) -> Result<FilterExpression, FilterError> {
    if depth >= QUERY_MAX_FILTER_DEPTH {
        return Err(FilterError::invalid(format!(
            "filter nesting exceeds {} levels",
            QUERY_MAX_FILTER_DEPTH
        )));
    }

    let (token, body) = single_entry(value, "filter node")?;

    match BoolKind::parse(token) {
        Some(BoolKind::Not) => {
            let operand = match body {
                Value::Array(items) if items.len() == 1 => &items[0],
                Value::Array(items) => {
                    return Err(FilterError::invalid(format!(
                        "not takes exactly one operand, got {}",
                        items.len()
                    )));
                }
                other => other,
            };
            Ok(FilterExpression::not(parse_node(operand, target, depth + 1)?))
        }
        Some(kind) => {
            let Value::Array(items) = body else {
                return Err(FilterError::invalid(format!(
                    "'{}' expects a list of operands",
                    token
                )));
            };
            if items.is_empty() {
                return Err(FilterError::invalid(format!(
                    "empty operand list for '{}'",
                    token
                )));
            }
            let operands = items
                .iter()
                .map(|item| parse_node(item, target, depth + 1))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FilterExpression::BoolOp { kind, operands })
        }
        None => parse_leaf(token, body, target),
    }
}

fn parse_leaf(token: &str, body: &Value, target: QueryTarget) -> Result<FilterExpression, FilterError> {
    let op = Operator::parse(token)?;
    let (field, raw) = single_entry(body, "comparison")?;
    let value = Scalar::from_json(raw)?;

    if let Some(key) = normalize_metadata_key(field) {
        if !target.supports_metadata() {
            return Err(FilterError::UnknownField(field.to_string()));
        }
        if op != Operator::Eq {
            return Err(FilterError::invalid(format!(
                "metadata key '{}' only supports '='",
                field
            )));
        }
        return Ok(FilterExpression::metadata(key, value));
    }

    Ok(FilterExpression::comparison(target.field(field)?, op, value))
}

/// `resource_metadata.x` and `metadata.x` both map to `metadata.x`
fn normalize_metadata_key(field: &str) -> Option<String> {
    if let Some(rest) = field.strip_prefix(RESOURCE_METADATA_PREFIX) {
        return Some(format!("{}{}", METADATA_PREFIX, rest));
    }
    if field.starts_with(METADATA_PREFIX) {
        return Some(field.to_string());
    }
    None
}

fn single_entry<'a>(value: &'a Value, what: &str) -> Result<(&'a str, &'a Value), FilterError> {
    let map: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| FilterError::invalid(format!("{} must be an object", what)))?;
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((key, body)), None) => Ok((key.as_str(), body)),
        _ => Err(FilterError::invalid(format!(
            "{} must have exactly one key, got {}",
            what,
            map.len()
        ))),
    }
}

/// Parse `[{"field": "asc"|"desc"}, ...]`
pub fn parse_orderby(json_str: &str, target: QueryTarget) -> Result<Vec<OrderBy>, FilterError> {
    let value: Value = serde_json::from_str(json_str)
        .map_err(|e| FilterError::invalid(format!("malformed orderby JSON: {}", e)))?;
    let Value::Array(items) = value else {
        return Err(FilterError::invalid("orderby must be a list"));
    };

    items
        .iter()
        .map(|item| {
            let (field, direction) = single_entry(item, "orderby entry")?;
            let direction = direction
                .as_str()
                .ok_or_else(|| FilterError::invalid("sort direction must be a string"))?;
            Ok(OrderBy {
                field: target.field(field)?,
                direction: SortDirection::parse(direction)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::builder::{compile_orderby, compile_tree};
    use crate::data::filters::types::SqlValue;
    use serde_json::json;

    #[test]
    fn parse_and_compile_complex_filter() {
        let json = r#"{"and": [
            {"and": [
                {"=": {"counter_name": "cpu_util"}},
                {">": {"counter_volume": 0.23}},
                {"<": {"counter_volume": 0.26}}]},
            {"or": [
                {"and": [
                    {">": {"timestamp": "2013-12-01T18:00:00"}},
                    {"<": {"timestamp": "2013-12-01T18:15:00"}}]},
                {"and": [
                    {">": {"timestamp": "2013-12-01T18:30:00"}},
                    {"<": {"timestamp": "2013-12-01T18:45:00"}}]}]}]}"#;
        let expr = parse_filter(json, QueryTarget::Samples).unwrap();
        let query = compile_tree(&expr).unwrap();
        assert_eq!(
            query.where_clause,
            " where counter_name = %s and counter_volume > %s and counter_volume < %s \
             and (timestamp > %s and timestamp < %s or timestamp > %s and timestamp < %s)"
        );
        assert_eq!(query.parameters.len(), 7);
    }

    #[test]
    fn resource_metadata_alias() {
        let json = r#"{"and": [
            {"=": {"counter_name": "cpu_util"}},
            {"=": {"resource_metadata.image.name": "cirros"}}]}"#;
        let expr = parse_filter(json, QueryTarget::Samples).unwrap();
        let query = compile_tree(&expr).unwrap();
        assert_eq!(query.where_clause, " where counter_name = %s and metadata @> %s");
        assert_eq!(
            query.parameters[1],
            SqlValue::Json(json!({"image": {"name": "cirros"}}))
        );
    }

    #[test]
    fn word_operators() {
        let expr = parse_filter(r#"{"ge": {"counter_volume": 1}}"#, QueryTarget::Samples).unwrap();
        let query = compile_tree(&expr).unwrap();
        assert_eq!(query.where_clause, " where counter_volume >= %s");
    }

    #[test]
    fn not_accepts_object_or_single_item_list() {
        let a = parse_filter(r#"{"not": {"=": {"state": "ok"}}}"#, QueryTarget::Alarms).unwrap();
        let b = parse_filter(r#"{"not": [{"=": {"state": "ok"}}]}"#, QueryTarget::Alarms).unwrap();
        assert_eq!(a, b);
        assert!(parse_filter(
            r#"{"not": [{"=": {"state": "ok"}}, {"=": {"state": "alarm"}}]}"#,
            QueryTarget::Alarms
        )
        .is_err());
    }

    #[test]
    fn empty_and_is_invalid() {
        assert!(matches!(
            parse_filter(r#"{"and": []}"#, QueryTarget::Samples),
            Err(FilterError::InvalidFilter(_))
        ));
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert_eq!(
            parse_filter(r#"{"=": {"colour": "red"}}"#, QueryTarget::Samples),
            Err(FilterError::UnknownField("colour".into()))
        );
        // metadata only exists on samples
        assert!(matches!(
            parse_filter(r#"{"=": {"metadata.a": 1}}"#, QueryTarget::Alarms),
            Err(FilterError::UnknownField(_))
        ));
    }

    #[test]
    fn malformed_nodes_are_rejected() {
        for json in [
            r#"[]"#,
            r#"{"=": {"counter_name": "a", "counter_unit": "b"}}"#,
            r#"{"=": {"counter_name": ["a"]}}"#,
            r#"{"like": {"counter_name": "a"}}"#,
            r#"{"and": {"=": {"counter_name": "a"}}}"#,
            r#"{}"#,
            "not json",
        ] {
            assert!(
                matches!(
                    parse_filter(json, QueryTarget::Samples),
                    Err(FilterError::InvalidFilter(_))
                ),
                "expected invalid: {}",
                json
            );
        }
    }

    #[test]
    fn size_limit() {
        let json = r#"{"=": {"counter_name": "cpu_util"}}"#;
        assert!(parse_filter_with_limit(json, QueryTarget::Samples, 8).is_err());
        assert!(parse_filter_with_limit(json, QueryTarget::Samples, 1024).is_ok());
    }

    #[test]
    fn depth_limit() {
        let mut json = r#"{"=": {"counter_name": "a"}}"#.to_string();
        for _ in 0..QUERY_MAX_FILTER_DEPTH {
            json = format!(r#"{{"not": {}}}"#, json);
        }
        assert!(parse_filter(&json, QueryTarget::Samples).is_err());
    }

    #[test]
    fn orderby() {
        let orderby = parse_orderby(r#"[{"counter_volume": "DESC"}]"#, QueryTarget::Samples).unwrap();
        assert_eq!(compile_orderby(&orderby), " order by counter_volume desc");
        assert!(parse_orderby(r#"[{"counter_volume": "sideways"}]"#, QueryTarget::Samples).is_err());
        assert!(parse_orderby(r#"[{"volume": "asc"}]"#, QueryTarget::Samples).is_err());
    }
}
