//! Flat sample filter compiler
//!
//! A flat filter is an implicit conjunction of optional fields. Conditions are
//! collected in a fixed order and joined once, so the clause never depends on
//! string surgery.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::error::FilterError;
use super::metadata;
use super::types::{
    Compilation, CompiledQuery, EmptyReason, PLACEHOLDER, Scalar, SqlParams, SqlValue,
};

/// Only override accepted for the start bound
pub const START_OP_GT: &str = "gt";
/// Only override accepted for the end bound
pub const END_OP_LE: &str = "le";
/// Only override accepted for an end bound that is inclusive by default
pub const END_OP_LT: &str = "lt";

/// Columns the flat compiler targets on the joined samples query
pub mod columns {
    pub const METER: &str = "meters.name";
    pub const SOURCE: &str = "sources.name";
    pub const TIMESTAMP: &str = "samples.timestamp";
    pub const USER: &str = "users.uuid";
    pub const PROJECT: &str = "projects.uuid";
    pub const RESOURCE: &str = "resources.resource_id";
    pub const MESSAGE_ID: &str = "samples.message_id";
}

/// Non-recursive sample filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatFilter {
    pub meter: Option<String>,
    pub source: Option<String>,
    pub user: Option<String>,
    pub project: Option<String>,
    pub resource: Option<String>,
    pub message_id: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub start_op: Option<String>,
    pub end: Option<NaiveDateTime>,
    pub end_op: Option<String>,
    /// Dotted `metadata.` keys to scalar values
    pub metaquery: BTreeMap<String, Scalar>,
}

impl FlatFilter {
    pub fn for_meter(meter: impl Into<String>) -> Self {
        Self {
            meter: Some(meter.into()),
            ..Default::default()
        }
    }
}

/// Role of a condition inside a flat conjunction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    Field,
    TimeStart,
    TimeEnd,
    Metadata,
}

/// One ANDed condition with the parameters it binds
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub clause: String,
    pub params: Vec<SqlValue>,
    pub kind: ConditionKind,
}

impl Condition {
    /// `<column> <op> %s` bound to a single value
    pub fn compare(column: &str, op: &str, value: SqlValue, kind: ConditionKind) -> Self {
        Self {
            clause: format!("{} {} {}", column, op, PLACEHOLDER),
            params: vec![value],
            kind,
        }
    }

    pub fn is_time_bound(&self) -> bool {
        matches!(self.kind, ConditionKind::TimeStart | ConditionKind::TimeEnd)
    }
}

/// Outcome of collecting flat conditions
#[derive(Debug, Clone, PartialEq)]
pub enum FlatConditions {
    Ready(Vec<Condition>),
    Empty(EmptyReason),
}

/// `>` when the caller asked for `gt`, `>=` otherwise
pub fn start_operator(start_op: Option<&str>) -> &'static str {
    match start_op {
        Some(START_OP_GT) => ">",
        _ => ">=",
    }
}

/// `<=` when the caller asked for `le`, `<` otherwise
pub fn end_operator(end_op: Option<&str>) -> &'static str {
    match end_op {
        Some(END_OP_LE) => "<=",
        _ => "<",
    }
}

/// `<` when the caller asked for `lt`, `<=` otherwise
pub fn inclusive_end_operator(end_op: Option<&str>) -> &'static str {
    match end_op {
        Some(END_OP_LT) => "<",
        _ => "<=",
    }
}

/// Start and end bound conditions against `column`, in that order
pub fn range_conditions(filter: &FlatFilter, column: &str) -> Vec<Condition> {
    let mut conditions = Vec::with_capacity(2);
    if let Some(start) = filter.start {
        conditions.push(Condition::compare(
            column,
            start_operator(filter.start_op.as_deref()),
            SqlValue::Timestamp(start),
            ConditionKind::TimeStart,
        ));
    }
    if let Some(end) = filter.end {
        conditions.push(Condition::compare(
            column,
            end_operator(filter.end_op.as_deref()),
            SqlValue::Timestamp(end),
            ConditionKind::TimeEnd,
        ));
    }
    conditions
}

/// Single merged containment condition for the whole metaquery
pub fn metaquery_condition(
    metaquery: &BTreeMap<String, Scalar>,
) -> Result<Option<Condition>, FilterError> {
    let mut params = SqlParams::default();
    let clause = metadata::build_merged_predicate(metaquery, &mut params)?;
    Ok(clause.map(|clause| Condition {
        clause,
        params: params.values,
        kind: ConditionKind::Metadata,
    }))
}

/// Collect the conditions of a flat filter in the fixed order
/// meter, source, start, end, user, project, resource, message_id, metaquery.
pub fn flat_conditions(
    filter: &FlatFilter,
    require_meter: bool,
) -> Result<FlatConditions, FilterError> {
    let mut conditions = Vec::new();

    match &filter.meter {
        Some(meter) => conditions.push(text_condition(columns::METER, meter)),
        None if require_meter => return Err(FilterError::MissingRequiredField("meter")),
        None => {}
    }

    if let Some(source) = &filter.source {
        conditions.push(text_condition(columns::SOURCE, source));
    }

    conditions.extend(range_conditions(filter, columns::TIMESTAMP));

    for (reference, column, value) in [
        ("user", columns::USER, &filter.user),
        ("project", columns::PROJECT, &filter.project),
    ] {
        if let Some(value) = value {
            let Some(condition) = uuid_condition(column, value) else {
                return Ok(FlatConditions::Empty(EmptyReason::MissingReference(
                    reference,
                )));
            };
            conditions.push(condition);
        }
    }

    if let Some(resource) = &filter.resource {
        conditions.push(text_condition(columns::RESOURCE, resource));
    }

    if let Some(message_id) = &filter.message_id {
        conditions.push(text_condition(columns::MESSAGE_ID, message_id));
    }

    if let Some(condition) = metaquery_condition(&filter.metaquery)? {
        conditions.push(condition);
    }

    Ok(FlatConditions::Ready(conditions))
}

/// Join conditions with `" and "` and prefix `" where "` once when non-empty
pub fn join_conditions<'a>(conditions: impl IntoIterator<Item = &'a Condition>) -> CompiledQuery {
    let mut clauses = Vec::new();
    let mut parameters = Vec::new();
    for condition in conditions {
        clauses.push(condition.clause.as_str());
        parameters.extend(condition.params.iter().cloned());
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" where {}", clauses.join(" and "))
    };

    CompiledQuery {
        where_clause,
        parameters,
    }
}

/// Append `" limit %s"` with its parameter
pub fn append_limit(query: &mut CompiledQuery, limit: u32) {
    query.where_clause.push_str(" limit ");
    query.where_clause.push_str(PLACEHOLDER);
    query.parameters.push(SqlValue::Int(i64::from(limit)));
}

/// Compile a flat filter into a WHERE fragment with an optional limit.
///
/// Validation happens first, so a zero limit never hides a malformed filter.
pub fn compile_flat(
    filter: &FlatFilter,
    limit: Option<u32>,
    require_meter: bool,
) -> Result<Compilation, FilterError> {
    let conditions = match flat_conditions(filter, require_meter)? {
        FlatConditions::Ready(conditions) => conditions,
        FlatConditions::Empty(reason) => return Ok(Compilation::Empty(reason)),
    };

    if limit == Some(0) {
        return Ok(Compilation::Empty(EmptyReason::ZeroLimit));
    }

    let mut query = join_conditions(&conditions);
    if let Some(limit) = limit {
        append_limit(&mut query, limit);
    }

    tracing::trace!(sql = %query.where_clause, params = query.parameters.len(), "Compiled flat filter");
    Ok(Compilation::Query(query))
}

/// `<column> = %s` bound to text
pub fn text_condition(column: &str, value: &str) -> Condition {
    Condition::compare(
        column,
        "=",
        SqlValue::Text(value.to_string()),
        ConditionKind::Field,
    )
}

/// `<column> = %s` bound to a uuid; `None` when `value` is not one, since it cannot match any row
pub fn uuid_condition(column: &str, value: &str) -> Option<Condition> {
    let uuid = Uuid::parse_str(value.trim()).ok()?;
    Some(Condition::compare(
        column,
        "=",
        SqlValue::Uuid(uuid),
        ConditionKind::Field,
    ))
}
