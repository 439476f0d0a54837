//! Meter repository for PostgreSQL operations

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::data::filters::{FlatFilter, compile_flat};
use crate::data::postgres::PostgresError;
use crate::data::postgres::query::fetch_compiled;
use crate::data::types::MeterRow;

/// Latest sample per meter and resource, joined with its identities
const METERS_QUERY: &str = "SELECT samples.meter_id, meters.name, meters.type, meters.unit, \
     resources.resource_id, projects.uuid as project_id, \
     sources.name as source_id, users.uuid as user_id \
     FROM meters \
     JOIN samples ON meters.id = samples.meter_id \
     JOIN (SELECT max(samples.id) as id FROM samples \
           GROUP BY samples.meter_id, samples.resource_id) as latest \
       ON samples.id = latest.id \
     JOIN resources ON samples.resource_id = resources.id \
     LEFT JOIN users ON samples.user_id = users.id \
     JOIN sources ON samples.source_id = sources.id \
     JOIN projects ON samples.project_id = projects.id";

/// Meters matching a flat filter; no meter name is required
pub async fn get_meters(pool: &PgPool, filter: &FlatFilter) -> Result<Vec<MeterRow>, PostgresError> {
    let compilation = compile_flat(filter, None, false)?;
    let mut rows = fetch_compiled(pool, METERS_QUERY, compilation, meter_from_row).await?;
    rows.sort_by_key(|row| row.meter_id);
    Ok(rows)
}

fn meter_from_row(row: &PgRow) -> Result<MeterRow, sqlx::Error> {
    Ok(MeterRow {
        meter_id: row.try_get("meter_id")?,
        name: row.try_get("name")?,
        meter_type: row.try_get("type")?,
        unit: row.try_get("unit")?,
        resource_id: row.try_get("resource_id")?,
        project_id: row.try_get("project_id")?,
        source_id: row.try_get("source_id")?,
        user_id: row.try_get("user_id")?,
    })
}
