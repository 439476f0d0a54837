//! Sample repository for PostgreSQL operations

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::data::filters::{FilterExpression, FlatFilter, OrderBy, compile_flat, compile_query};
use crate::data::postgres::PostgresError;
use crate::data::postgres::query::fetch_compiled;
use crate::data::types::SampleRow;

const SAMPLE_COLUMNS: &str = "samples.id, meters.name as counter_name, \
     meters.type as counter_type, meters.unit as counter_unit, \
     samples.volume as counter_volume, resources.resource_id, \
     sources.name as source_id, users.uuid as user_id, projects.uuid as project_id, \
     samples.timestamp, samples.recorded_at, samples.message_id, \
     samples.message_signature, samples.metadata";

const SAMPLE_JOINS: &str = " FROM samples \
     JOIN meters ON samples.meter_id = meters.id \
     JOIN resources ON samples.resource_id = resources.id \
     LEFT JOIN users ON samples.user_id = users.id \
     LEFT JOIN projects ON samples.project_id = projects.id \
     JOIN sources ON samples.source_id = sources.id";

/// Samples matching a flat filter; the meter is required
pub async fn get_samples(
    pool: &PgPool,
    filter: &FlatFilter,
    limit: Option<u32>,
) -> Result<Vec<SampleRow>, PostgresError> {
    let compilation = compile_flat(filter, limit, true)?;
    let base = format!("SELECT {}{}", SAMPLE_COLUMNS, SAMPLE_JOINS);
    fetch_compiled(pool, &base, compilation, sample_from_row).await
}

/// Samples matching an expression tree over the samples fields
pub async fn query_samples(
    pool: &PgPool,
    filter: Option<&FilterExpression>,
    orderby: &[OrderBy],
    limit: Option<u32>,
) -> Result<Vec<SampleRow>, PostgresError> {
    let compilation = compile_query(filter, orderby, limit)?;
    // the subselect exposes the public field names the filter compiles against
    let base = format!("SELECT * FROM (SELECT {}{}) as c", SAMPLE_COLUMNS, SAMPLE_JOINS);
    fetch_compiled(pool, &base, compilation, sample_from_row).await
}

fn sample_from_row(row: &PgRow) -> Result<SampleRow, sqlx::Error> {
    Ok(SampleRow {
        id: row.try_get("id")?,
        counter_name: row.try_get("counter_name")?,
        counter_type: row.try_get("counter_type")?,
        counter_unit: row.try_get("counter_unit")?,
        counter_volume: row.try_get("counter_volume")?,
        resource_id: row.try_get("resource_id")?,
        source_id: row.try_get("source_id")?,
        user_id: row.try_get("user_id")?,
        project_id: row.try_get("project_id")?,
        timestamp: row.try_get("timestamp")?,
        recorded_at: row.try_get("recorded_at")?,
        message_id: row.try_get("message_id")?,
        message_signature: row.try_get("message_signature")?,
        resource_metadata: row.try_get("metadata")?,
    })
}
