//! Alarm repository for PostgreSQL operations
//!
//! Alarms and their history are read either through expression trees or
//! through flat field filters. Flat filters reuse the sample condition list,
//! so user and project identifiers that are not uuids match nothing.

use chrono::NaiveDateTime;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::data::filters::flat::{
    inclusive_end_operator, join_conditions, start_operator, text_condition, uuid_condition,
};
use crate::data::filters::{
    Compilation, Condition, ConditionKind, EmptyReason, FilterExpression, OrderBy, SqlValue,
    compile_query,
};
use crate::data::postgres::PostgresError;
use crate::data::postgres::query::fetch_compiled;
use crate::data::types::{AlarmChangeRow, AlarmRow};

const ALARMS_QUERY: &str = "SELECT * FROM (\
     SELECT alarm.alarm_id, alarm.enabled, alarm.name, alarm.type, alarm.description, \
     alarm.timestamp, users.uuid as user_id, projects.uuid as project_id, alarm.state, \
     alarm.ok_actions, alarm.alarm_actions, alarm.insufficient_data_actions, \
     alarm.repeat_actions, alarm.rule, alarm.time_constraints \
     FROM alarm \
     LEFT JOIN users ON alarm.user_id = users.id \
     LEFT JOIN projects ON alarm.project_id = projects.id) as c";

const ALARM_CHANGES_QUERY: &str = "SELECT * FROM (\
     SELECT alarm_change.event_id, alarm_change.alarm_id, alarm_change.type, \
     alarm_change.detail, users.uuid as user_id, projects.uuid as project_id, \
     on_behalf.uuid as on_behalf_of, alarm_change.timestamp \
     FROM alarm_change \
     LEFT JOIN users ON alarm_change.user_id = users.id \
     LEFT JOIN projects ON alarm_change.project_id = projects.id \
     LEFT JOIN projects as on_behalf ON alarm_change.on_behalf_of = on_behalf.id) as c";

const FLAT_ALARMS_QUERY: &str = "SELECT alarm.alarm_id, alarm.enabled, alarm.name, alarm.type, \
     alarm.description, alarm.timestamp, users.uuid as user_id, projects.uuid as project_id, \
     alarm.state, alarm.ok_actions, alarm.alarm_actions, alarm.insufficient_data_actions, \
     alarm.repeat_actions, alarm.rule, alarm.time_constraints \
     FROM alarm \
     LEFT JOIN users ON alarm.user_id = users.id \
     LEFT JOIN projects ON alarm.project_id = projects.id";

const FLAT_ALARM_CHANGES_QUERY: &str = "SELECT alarm_change.event_id, alarm_change.alarm_id, \
     alarm_change.type, alarm_change.detail, users.uuid as user_id, \
     projects.uuid as project_id, on_behalf.uuid as on_behalf_of, alarm_change.timestamp \
     FROM alarm_change \
     LEFT JOIN users ON alarm_change.user_id = users.id \
     LEFT JOIN projects ON alarm_change.project_id = projects.id \
     LEFT JOIN projects as on_behalf ON alarm_change.on_behalf_of = on_behalf.id";

/// Flat alarm filter; every field is optional and all given fields must match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmFilter {
    pub name: Option<String>,
    pub user: Option<String>,
    pub project: Option<String>,
    pub state: Option<String>,
    pub enabled: Option<bool>,
    pub alarm_id: Option<i64>,
}

/// History of one alarm, newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmChangeFilter {
    pub alarm_id: i64,
    /// Tenant the change was made for; `None` sees every tenant
    pub on_behalf_of: Option<String>,
    pub user: Option<String>,
    pub project: Option<String>,
    pub change_type: Option<String>,
    pub start: Option<NaiveDateTime>,
    /// `gt` for an exclusive start, inclusive otherwise
    pub start_op: Option<String>,
    pub end: Option<NaiveDateTime>,
    /// `lt` for an exclusive end, inclusive otherwise
    pub end_op: Option<String>,
}

fn field_condition(column: &str, value: SqlValue) -> Condition {
    Condition::compare(column, "=", value, ConditionKind::Field)
}

/// Compile a flat alarm filter in the order name, enabled, user, project, alarm_id, state
pub fn compile_alarm_filter(filter: &AlarmFilter) -> Compilation {
    let mut conditions = Vec::new();

    if let Some(name) = &filter.name {
        conditions.push(text_condition("alarm.name", name));
    }
    if let Some(enabled) = filter.enabled {
        conditions.push(field_condition("alarm.enabled", SqlValue::Bool(enabled)));
    }
    for (reference, column, value) in [
        ("user", "users.uuid", &filter.user),
        ("project", "projects.uuid", &filter.project),
    ] {
        if let Some(value) = value {
            let Some(condition) = uuid_condition(column, value) else {
                return Compilation::Empty(EmptyReason::MissingReference(reference));
            };
            conditions.push(condition);
        }
    }
    if let Some(alarm_id) = filter.alarm_id {
        conditions.push(field_condition("alarm.alarm_id", SqlValue::Int(alarm_id)));
    }
    if let Some(state) = &filter.state {
        conditions.push(text_condition("alarm.state", state));
    }

    Compilation::Query(join_conditions(&conditions))
}

/// Compile an alarm history filter, ordered newest first.
///
/// Both time bounds are inclusive unless `gt`/`lt` is asked for.
pub fn compile_alarm_change_filter(filter: &AlarmChangeFilter) -> Compilation {
    let mut conditions = vec![field_condition(
        "alarm_change.alarm_id",
        SqlValue::Int(filter.alarm_id),
    )];

    for (reference, column, value) in [
        ("on_behalf_of", "on_behalf.uuid", &filter.on_behalf_of),
        ("user", "users.uuid", &filter.user),
        ("project", "projects.uuid", &filter.project),
    ] {
        if let Some(value) = value {
            let Some(condition) = uuid_condition(column, value) else {
                return Compilation::Empty(EmptyReason::MissingReference(reference));
            };
            conditions.push(condition);
        }
    }
    if let Some(change_type) = &filter.change_type {
        conditions.push(text_condition("alarm_change.type", change_type));
    }
    if let Some(start) = filter.start {
        conditions.push(Condition::compare(
            "alarm_change.timestamp",
            start_operator(filter.start_op.as_deref()),
            SqlValue::Timestamp(start),
            ConditionKind::TimeStart,
        ));
    }
    if let Some(end) = filter.end {
        conditions.push(Condition::compare(
            "alarm_change.timestamp",
            inclusive_end_operator(filter.end_op.as_deref()),
            SqlValue::Timestamp(end),
            ConditionKind::TimeEnd,
        ));
    }

    let mut query = join_conditions(&conditions);
    query.where_clause.push_str(" order by alarm_change.timestamp desc");
    Compilation::Query(query)
}

/// Alarms matching a flat filter
pub async fn get_alarms(
    pool: &PgPool,
    filter: &AlarmFilter,
) -> Result<Vec<AlarmRow>, PostgresError> {
    fetch_compiled(pool, FLAT_ALARMS_QUERY, compile_alarm_filter(filter), alarm_from_row).await
}

/// History of one alarm, newest first
pub async fn get_alarm_changes(
    pool: &PgPool,
    filter: &AlarmChangeFilter,
) -> Result<Vec<AlarmChangeRow>, PostgresError> {
    fetch_compiled(
        pool,
        FLAT_ALARM_CHANGES_QUERY,
        compile_alarm_change_filter(filter),
        alarm_change_from_row,
    )
    .await
}

/// Alarms matching an expression tree over the alarm fields
pub async fn query_alarms(
    pool: &PgPool,
    filter: Option<&FilterExpression>,
    orderby: &[OrderBy],
    limit: Option<u32>,
) -> Result<Vec<AlarmRow>, PostgresError> {
    let compilation = compile_query(filter, orderby, limit)?;
    fetch_compiled(pool, ALARMS_QUERY, compilation, alarm_from_row).await
}

/// Alarm history entries matching an expression tree over the change fields
pub async fn query_alarm_history(
    pool: &PgPool,
    filter: Option<&FilterExpression>,
    orderby: &[OrderBy],
    limit: Option<u32>,
) -> Result<Vec<AlarmChangeRow>, PostgresError> {
    let compilation = compile_query(filter, orderby, limit)?;
    fetch_compiled(pool, ALARM_CHANGES_QUERY, compilation, alarm_change_from_row).await
}

fn alarm_from_row(row: &PgRow) -> Result<AlarmRow, sqlx::Error> {
    Ok(AlarmRow {
        alarm_id: row.try_get("alarm_id")?,
        enabled: row.try_get("enabled")?,
        name: row.try_get("name")?,
        alarm_type: row.try_get("type")?,
        description: row.try_get("description")?,
        timestamp: row.try_get("timestamp")?,
        user_id: row.try_get("user_id")?,
        project_id: row.try_get("project_id")?,
        state: row.try_get("state")?,
        ok_actions: row.try_get("ok_actions")?,
        alarm_actions: row.try_get("alarm_actions")?,
        insufficient_data_actions: row.try_get("insufficient_data_actions")?,
        repeat_actions: row.try_get("repeat_actions")?,
        rule: row.try_get("rule")?,
        time_constraints: row.try_get("time_constraints")?,
    })
}

fn alarm_change_from_row(row: &PgRow) -> Result<AlarmChangeRow, sqlx::Error> {
    Ok(AlarmChangeRow {
        event_id: row.try_get("event_id")?,
        alarm_id: row.try_get("alarm_id")?,
        change_type: row.try_get("type")?,
        detail: row.try_get("detail")?,
        user_id: row.try_get("user_id")?,
        project_id: row.try_get("project_id")?,
        on_behalf_of: row.try_get("on_behalf_of")?,
        timestamp: row.try_get("timestamp")?,
    })
}
