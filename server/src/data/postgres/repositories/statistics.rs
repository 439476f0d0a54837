//! Statistics repository for PostgreSQL operations

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::data::DataError;
use crate::data::postgres::query::fetch_rows;
use crate::data::types::{StatisticsBucket, StatisticsRow};
use crate::domain::statistics::{
    AggregateFunction, StatisticsAggregator, StatisticsExecutor, StatisticsQuery, StatsError,
    StatsStatement,
};

/// Executes aggregate statements against the sample tables
pub struct PgStatisticsExecutor {
    pool: PgPool,
}

impl PgStatisticsExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatisticsExecutor for PgStatisticsExecutor {
    async fn fetch_statistics(
        &self,
        statement: &StatsStatement,
    ) -> Result<Vec<StatisticsRow>, DataError> {
        let rows = fetch_rows(&self.pool, &statement.sql, &statement.params).await?;
        rows.iter()
            .map(|row| statistics_from_row(row, statement).map_err(DataError::from_postgres))
            .collect()
    }
}

fn statistics_from_row(
    row: &PgRow,
    statement: &StatsStatement,
) -> Result<StatisticsRow, sqlx::Error> {
    let mut aggregates = BTreeMap::new();
    for aggregate in &statement.aggregates {
        let value = match aggregate {
            AggregateFunction::Count => Some(row.try_get::<i64, _>(aggregate.name())? as f64),
            _ => row.try_get::<Option<f64>, _>(aggregate.name())?,
        };
        if let Some(value) = value {
            aggregates.insert(aggregate.name().to_string(), value);
        }
    }

    let mut groupby = BTreeMap::new();
    for field in &statement.groupby {
        let value = if field.is_uuid() {
            row.try_get::<Option<Uuid>, _>(field.name())?
                .map(|uuid| uuid.to_string())
        } else {
            row.try_get::<Option<String>, _>(field.name())?
        };
        if let Some(value) = value {
            groupby.insert(field.name().to_string(), value);
        }
    }

    Ok(StatisticsRow {
        tsmin: row.try_get("tsmin")?,
        tsmax: row.try_get("tsmax")?,
        unit: row.try_get("unit")?,
        aggregates,
        groupby,
    })
}

/// Meter statistics over PostgreSQL, stopping early once `cancel` fires
pub async fn get_meter_statistics(
    pool: &PgPool,
    query: &StatisticsQuery,
    cancel: CancellationToken,
) -> Result<Vec<StatisticsBucket>, StatsError> {
    StatisticsAggregator::new(PgStatisticsExecutor::new(pool.clone()))
        .with_cancellation(cancel)
        .get_meter_statistics(query)
        .await
}
