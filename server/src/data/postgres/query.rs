//! Binding compiled filters to PostgreSQL statements

use sqlx::PgPool;
use sqlx::Postgres;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;

use super::PostgresError;
use crate::data::filters::{Compilation, SqlValue};
use crate::data::sql::{PostgresDialect, SqlDialect};

/// Bind values positionally, in the order the compiler emitted them
pub fn bind_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    values: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in values {
        query = match value {
            SqlValue::Bool(b) => query.bind(*b),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Text(s) => query.bind(s.as_str()),
            SqlValue::Uuid(u) => query.bind(*u),
            SqlValue::Timestamp(ts) => query.bind(*ts),
            SqlValue::Json(v) => query.bind(sqlx::types::Json(v)),
        };
    }
    query
}

/// Render `%s` placeholders and run the statement
pub async fn fetch_rows(
    pool: &PgPool,
    sql: &str,
    values: &[SqlValue],
) -> Result<Vec<PgRow>, PostgresError> {
    let rendered = PostgresDialect.render(sql);
    tracing::trace!(sql = %rendered, params = values.len(), "Executing query");
    let rows = bind_values(sqlx::query(&rendered), values)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Run `base` followed by a compiled tail and map every row.
///
/// An empty compilation returns no rows without touching the pool.
pub async fn fetch_compiled<T>(
    pool: &PgPool,
    base: &str,
    compilation: Compilation,
    map: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>, PostgresError> {
    let query = match compilation {
        Compilation::Query(query) => query,
        Compilation::Empty(reason) => {
            tracing::debug!(?reason, "Query short-circuited");
            return Ok(Vec::new());
        }
    };

    let sql = format!("{}{}", base, query.where_clause);
    let rows = fetch_rows(pool, &sql, &query.parameters).await?;
    rows.iter()
        .map(|row| map(row).map_err(PostgresError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::EmptyReason;

    fn never_called(_: &PgRow) -> Result<(), sqlx::Error> {
        unreachable!("empty compilations never fetch rows")
    }

    #[tokio::test]
    async fn test_empty_compilation_skips_round_trip() {
        // a lazy pool never connects unless a query is issued
        let pool = PgPool::connect_lazy("postgres://nobody@127.0.0.1:1/none").unwrap();
        for reason in [EmptyReason::ZeroLimit, EmptyReason::MissingReference("user")] {
            let rows = fetch_compiled(&pool, "SELECT 1", Compilation::Empty(reason), never_called)
                .await
                .unwrap();
            assert!(rows.is_empty());
        }
    }
}
