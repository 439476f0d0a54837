//! Filter type definitions
//!
//! Defines the expression tree, the bound parameter values and the compiled
//! output shared by the tree, flat and metadata compilers.

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use super::error::FilterError;
use crate::utils::time::parse_timestamp;

/// Positional placeholder emitted for every bound parameter
pub const PLACEHOLDER: &str = "%s";

/// Comparison operators accepted in filter leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    /// Parse an operator token. Accepts the symbolic and the word form.
    pub fn parse(token: &str) -> Result<Self, FilterError> {
        match token.to_lowercase().as_str() {
            "=" | "eq" => Ok(Self::Eq),
            "!=" | "ne" => Ok(Self::Ne),
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "le" => Ok(Self::Le),
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "ge" => Ok(Self::Ge),
            _ => Err(FilterError::invalid(format!(
                "unsupported operator '{}'",
                token
            ))),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Leaf value of a filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON leaf into a scalar. Arrays, objects and null are rejected.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, FilterError> {
        match value {
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(FilterError::invalid(format!("unsupported number {}", n)))
                }
            }
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            other => Err(FilterError::invalid(format!(
                "filter values must be scalars, got {}",
                other
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A value bound to a positional placeholder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
}

/// Collects SQL parameters during query building (maintains insertion order)
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SqlParams {
    pub values: Vec<SqlValue>,
}

impl SqlParams {
    /// Append a value and return the placeholder that binds it
    pub fn bind(&mut self, value: SqlValue) -> &'static str {
        self.values.push(value);
        PLACEHOLDER
    }
}

/// Column type of an allow-listed field, used to coerce leaf values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Bool,
    Uuid,
    Timestamp,
}

impl FieldKind {
    /// Coerce a scalar into the bound value for a column of this kind
    pub fn coerce(&self, field: &str, value: &Scalar) -> Result<SqlValue, FilterError> {
        let mismatch = || {
            FilterError::invalid(format!(
                "value {:?} does not fit field '{}' ({:?})",
                value, field, self
            ))
        };
        match (self, value) {
            (Self::Text, Scalar::Text(s)) => Ok(SqlValue::Text(s.clone())),
            (Self::Text, Scalar::Int(i)) => Ok(SqlValue::Text(i.to_string())),
            (Self::Text, Scalar::Float(f)) => Ok(SqlValue::Text(f.to_string())),
            (Self::Integer, Scalar::Int(i)) => Ok(SqlValue::Int(*i)),
            (Self::Integer, Scalar::Text(s)) => {
                s.trim().parse().map(SqlValue::Int).map_err(|_| mismatch())
            }
            (Self::Float, Scalar::Float(f)) => Ok(SqlValue::Float(*f)),
            (Self::Float, Scalar::Int(i)) => Ok(SqlValue::Float(*i as f64)),
            (Self::Float, Scalar::Text(s)) => {
                s.trim().parse().map(SqlValue::Float).map_err(|_| mismatch())
            }
            (Self::Bool, Scalar::Bool(b)) => Ok(SqlValue::Bool(*b)),
            (Self::Bool, Scalar::Text(s)) => match s.to_lowercase().as_str() {
                "t" | "true" | "1" => Ok(SqlValue::Bool(true)),
                "f" | "false" | "0" => Ok(SqlValue::Bool(false)),
                _ => Err(mismatch()),
            },
            (Self::Uuid, Scalar::Text(s)) => Uuid::parse_str(s.trim())
                .map(SqlValue::Uuid)
                .map_err(|_| mismatch()),
            (Self::Timestamp, Scalar::Text(s)) => parse_timestamp(s)
                .map(SqlValue::Timestamp)
                .ok_or_else(mismatch),
            _ => Err(mismatch()),
        }
    }
}

/// An allow-listed field: public name, SQL column expression and type
#[derive(Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

/// Reference to a field that is known to be on an allow-list.
///
/// The only way to obtain one is [`FieldRef::lookup`], so column text in a
/// compiled query never comes from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef(&'static FieldDef);

impl FieldRef {
    pub fn lookup(fields: &'static [FieldDef], name: &str) -> Result<Self, FilterError> {
        fields
            .iter()
            .find(|f| f.name == name)
            .map(Self)
            .ok_or_else(|| FilterError::UnknownField(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        self.0.name
    }

    pub fn column(&self) -> &'static str {
        self.0.column
    }

    pub fn kind(&self) -> FieldKind {
        self.0.kind
    }
}

/// Interior node kinds of the expression tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolKind {
    And,
    Or,
    Not,
}

impl BoolKind {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "and" => Some(Self::And),
            "or" => Some(Self::Or),
            "not" => Some(Self::Not),
            _ => None,
        }
    }
}

/// Filter expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Comparison {
        field: FieldRef,
        op: Operator,
        value: Scalar,
    },
    MetadataMatch {
        dotted_key: String,
        value: Scalar,
    },
    BoolOp {
        kind: BoolKind,
        operands: Vec<FilterExpression>,
    },
}

impl FilterExpression {
    pub fn comparison(field: FieldRef, op: Operator, value: impl Into<Scalar>) -> Self {
        Self::Comparison {
            field,
            op,
            value: value.into(),
        }
    }

    pub fn metadata(dotted_key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::MetadataMatch {
            dotted_key: dotted_key.into(),
            value: value.into(),
        }
    }

    pub fn and(operands: Vec<FilterExpression>) -> Self {
        Self::BoolOp {
            kind: BoolKind::And,
            operands,
        }
    }

    pub fn or(operands: Vec<FilterExpression>) -> Self {
        Self::BoolOp {
            kind: BoolKind::Or,
            operands,
        }
    }

    pub fn not(operand: FilterExpression) -> Self {
        Self::BoolOp {
            kind: BoolKind::Not,
            operands: vec![operand],
        }
    }
}

/// Compiled WHERE fragment plus its positional parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledQuery {
    pub where_clause: String,
    pub parameters: Vec<SqlValue>,
}

impl CompiledQuery {
    /// Number of positional placeholders in the clause
    pub fn placeholder_count(&self) -> usize {
        self.where_clause.matches(PLACEHOLDER).count()
    }
}

/// Why a compilation produced no query at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmptyReason {
    /// The caller asked for zero rows
    ZeroLimit,
    /// A referenced identifier cannot match any row
    MissingReference(&'static str),
}

/// Result of compiling a request that may be answered without a round trip
#[derive(Debug, Clone, PartialEq)]
pub enum Compilation {
    Query(CompiledQuery),
    Empty(EmptyReason),
}

impl Compilation {
    pub fn into_query(self) -> Option<CompiledQuery> {
        match self {
            Self::Query(q) => Some(q),
            Self::Empty(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[FieldDef] = &[
        FieldDef::new("volume", "samples.volume", FieldKind::Float),
        FieldDef::new("user_id", "users.uuid", FieldKind::Uuid),
    ];

    #[test]
    fn operator_accepts_word_and_symbol_forms() {
        assert_eq!(Operator::parse("=").unwrap(), Operator::Eq);
        assert_eq!(Operator::parse("GE").unwrap(), Operator::Ge);
        assert_eq!(Operator::parse("ne").unwrap().as_sql(), "!=");
        assert!(matches!(
            Operator::parse("like"),
            Err(FilterError::InvalidFilter(_))
        ));
    }

    #[test]
    fn field_lookup_rejects_unknown_names() {
        let field = FieldRef::lookup(FIELDS, "volume").unwrap();
        assert_eq!(field.column(), "samples.volume");
        assert!(matches!(
            FieldRef::lookup(FIELDS, "volume; drop table samples"),
            Err(FilterError::UnknownField(_))
        ));
    }

    #[test]
    fn coerce_int_into_float_column() {
        let v = FieldKind::Float.coerce("volume", &Scalar::Int(5)).unwrap();
        assert_eq!(v, SqlValue::Float(5.0));
    }

    #[test]
    fn coerce_rejects_malformed_uuid() {
        let err = FieldKind::Uuid
            .coerce("user_id", &Scalar::from("not-a-uuid"))
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidFilter(_)));
    }

    #[test]
    fn coerce_text_timestamp() {
        let v = FieldKind::Timestamp
            .coerce("timestamp", &Scalar::from("2013-12-01T18:00:00"))
            .unwrap();
        assert!(matches!(v, SqlValue::Timestamp(_)));
    }

    #[test]
    fn scalar_from_json_rejects_objects() {
        assert!(Scalar::from_json(&serde_json::json!({"a": 1})).is_err());
        assert_eq!(
            Scalar::from_json(&serde_json::json!(1.5)).unwrap(),
            Scalar::Float(1.5)
        );
    }

    #[test]
    fn sql_params_bind_returns_placeholder() {
        let mut params = SqlParams::default();
        assert_eq!(params.bind(SqlValue::Int(1)), "%s");
        assert_eq!(params.values, vec![SqlValue::Int(1)]);
    }
}
