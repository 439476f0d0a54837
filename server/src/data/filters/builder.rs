//! SQL filter builder
//!
//! Compiles expression trees into WHERE clauses over the complex-query targets.
//! Includes the column allow-lists each target exposes.

use super::error::FilterError;
use super::flat::append_limit;
use super::metadata;
use super::types::{
    BoolKind, Compilation, CompiledQuery, EmptyReason, FieldDef, FieldRef, FilterExpression,
    SqlParams,
};

/// Column allow-lists for the complex-query targets.
///
/// Column names are the aliases exposed by each target's base subselect.
pub mod columns {
    use super::super::types::{FieldDef, FieldKind};

    pub const SAMPLE_FIELDS: &[FieldDef] = &[
        FieldDef::new("counter_name", "counter_name", FieldKind::Text),
        FieldDef::new("counter_type", "counter_type", FieldKind::Text),
        FieldDef::new("counter_unit", "counter_unit", FieldKind::Text),
        FieldDef::new("counter_volume", "counter_volume", FieldKind::Float),
        FieldDef::new("resource_id", "resource_id", FieldKind::Text),
        FieldDef::new("source_id", "source_id", FieldKind::Text),
        FieldDef::new("user_id", "user_id", FieldKind::Uuid),
        FieldDef::new("project_id", "project_id", FieldKind::Uuid),
        FieldDef::new("timestamp", "timestamp", FieldKind::Timestamp),
        FieldDef::new("recorded_at", "recorded_at", FieldKind::Timestamp),
        FieldDef::new("message_id", "message_id", FieldKind::Text),
        FieldDef::new("message_signature", "message_signature", FieldKind::Text),
    ];

    pub const ALARM_FIELDS: &[FieldDef] = &[
        FieldDef::new("alarm_id", "alarm_id", FieldKind::Integer),
        FieldDef::new("enabled", "enabled", FieldKind::Bool),
        FieldDef::new("name", "name", FieldKind::Text),
        FieldDef::new("type", "type", FieldKind::Text),
        FieldDef::new("description", "description", FieldKind::Text),
        FieldDef::new("state", "state", FieldKind::Text),
        FieldDef::new("user_id", "user_id", FieldKind::Uuid),
        FieldDef::new("project_id", "project_id", FieldKind::Uuid),
        FieldDef::new("timestamp", "timestamp", FieldKind::Timestamp),
        FieldDef::new("repeat_actions", "repeat_actions", FieldKind::Bool),
    ];

    pub const ALARM_CHANGE_FIELDS: &[FieldDef] = &[
        FieldDef::new("event_id", "event_id", FieldKind::Integer),
        FieldDef::new("alarm_id", "alarm_id", FieldKind::Integer),
        FieldDef::new("type", "type", FieldKind::Text),
        FieldDef::new("detail", "detail", FieldKind::Text),
        FieldDef::new("user_id", "user_id", FieldKind::Uuid),
        FieldDef::new("project_id", "project_id", FieldKind::Uuid),
        FieldDef::new("on_behalf_of", "on_behalf_of", FieldKind::Uuid),
        FieldDef::new("timestamp", "timestamp", FieldKind::Timestamp),
    ];
}

/// Entity a complex query runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTarget {
    Samples,
    Alarms,
    AlarmHistory,
}

impl QueryTarget {
    pub fn fields(&self) -> &'static [FieldDef] {
        match self {
            Self::Samples => columns::SAMPLE_FIELDS,
            Self::Alarms => columns::ALARM_FIELDS,
            Self::AlarmHistory => columns::ALARM_CHANGE_FIELDS,
        }
    }

    /// Only samples carry a metadata document
    pub fn supports_metadata(&self) -> bool {
        matches!(self, Self::Samples)
    }

    pub fn field(&self, name: &str) -> Result<FieldRef, FilterError> {
        FieldRef::lookup(self.fields(), name)
    }
}

impl std::str::FromStr for QueryTarget {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "samples" => Ok(Self::Samples),
            "alarms" => Ok(Self::Alarms),
            "alarm_history" | "alarm-history" => Ok(Self::AlarmHistory),
            other => Err(FilterError::invalid(format!(
                "unknown query target '{}'",
                other
            ))),
        }
    }
}

/// Sort direction of an order-by entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(token: &str) -> Result<Self, FilterError> {
        match token.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(FilterError::invalid(format!(
                "unsupported sort direction '{}'",
                token
            ))),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One `field direction` entry of an order-by list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub field: FieldRef,
    pub direction: SortDirection,
}

/// Compile an expression tree into `" where ..."` plus parameters
pub fn compile_tree(expr: &FilterExpression) -> Result<CompiledQuery, FilterError> {
    let mut params = SqlParams::default();
    let body = build_expression(expr, &mut params)?;
    Ok(CompiledQuery {
        where_clause: format!(" where {}", body),
        parameters: params.values,
    })
}

fn build_expression(expr: &FilterExpression, params: &mut SqlParams) -> Result<String, FilterError> {
    match expr {
        FilterExpression::Comparison { field, op, value } => {
            let bound = field.kind().coerce(field.name(), value)?;
            let placeholder = params.bind(bound);
            Ok(format!("{} {} {}", field.column(), op.as_sql(), placeholder))
        }
        FilterExpression::MetadataMatch { dotted_key, value } => {
            metadata::build_predicate(dotted_key, value, params)
        }
        FilterExpression::BoolOp { kind, operands } => match kind {
            BoolKind::And => Ok(join_operands("and", operands, params)?.join(" and ")),
            BoolKind::Or => Ok(format!("({})", join_operands("or", operands, params)?.join(" or "))),
            BoolKind::Not => {
                let [operand] = operands.as_slice() else {
                    return Err(FilterError::invalid(format!(
                        "not takes exactly one operand, got {}",
                        operands.len()
                    )));
                };
                let inner = build_expression(operand, params)?;
                if needs_parens_under_not(operand) {
                    Ok(format!("not ({})", inner))
                } else {
                    Ok(format!("not {}", inner))
                }
            }
        },
    }
}

fn join_operands(
    name: &str,
    operands: &[FilterExpression],
    params: &mut SqlParams,
) -> Result<Vec<String>, FilterError> {
    if operands.is_empty() {
        return Err(FilterError::invalid(format!("empty operand list for '{}'", name)));
    }
    operands
        .iter()
        .map(|operand| build_expression(operand, params))
        .collect()
}

// An unparenthesized conjunction would bind `not` to its first operand only.
// Single-operand `and` nodes compile to their operand, so look through them.
fn needs_parens_under_not(operand: &FilterExpression) -> bool {
    match operand {
        FilterExpression::BoolOp {
            kind: BoolKind::And,
            operands,
        } => match operands.as_slice() {
            [only] => needs_parens_under_not(only),
            _ => true,
        },
        _ => false,
    }
}

/// Compile an order-by list into `" order by col dir, ..."`
pub fn compile_orderby(orderby: &[OrderBy]) -> String {
    if orderby.is_empty() {
        return String::new();
    }
    let items: Vec<String> = orderby
        .iter()
        .map(|o| format!("{} {}", o.field.column(), o.direction.as_sql()))
        .collect();
    format!(" order by {}", items.join(", "))
}

/// Compile the tail of a complex query: filter, ordering and limit.
///
/// A zero limit yields [`Compilation::Empty`] once the filter has validated.
pub fn compile_query(
    filter: Option<&FilterExpression>,
    orderby: &[OrderBy],
    limit: Option<u32>,
) -> Result<Compilation, FilterError> {
    let mut query = match filter {
        Some(expr) => compile_tree(expr)?,
        None => CompiledQuery::default(),
    };

    if limit == Some(0) {
        return Ok(Compilation::Empty(EmptyReason::ZeroLimit));
    }

    query.where_clause.push_str(&compile_orderby(orderby));
    if let Some(limit) = limit {
        append_limit(&mut query, limit);
    }

    tracing::trace!(sql = %query.where_clause, params = query.parameters.len(), "Compiled complex query");
    Ok(Compilation::Query(query))
}
