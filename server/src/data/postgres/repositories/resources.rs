//! Resource repository for PostgreSQL operations
//!
//! Resources are listed from an aggregate over samples keyed by surrogate ids,
//! so external identifiers are resolved up front. An identifier that resolves
//! to nothing means no resource can match.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::data::filters::flat::{
    Condition, ConditionKind, join_conditions, metaquery_condition, range_conditions,
};
use crate::data::filters::{Compilation, EmptyReason, FlatFilter, SqlValue};
use crate::data::postgres::PostgresError;
use crate::data::postgres::query::fetch_compiled;
use crate::data::types::ResourceRow;

/// Kinds of external identifier a flat filter may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Resource,
    User,
    Project,
    Source,
    Meter,
}

impl IdentifierKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::User => "user",
            Self::Project => "project",
            Self::Source => "source",
            Self::Meter => "meter",
        }
    }

    /// Surrogate key column on the samples table
    fn sample_column(&self) -> &'static str {
        match self {
            Self::Resource => "samples.resource_id",
            Self::User => "samples.user_id",
            Self::Project => "samples.project_id",
            Self::Source => "samples.source_id",
            Self::Meter => "samples.meter_id",
        }
    }
}

/// Resolves external identifiers to internal surrogate keys
#[async_trait]
pub trait IdentifierResolver: Send + Sync {
    /// `None` when the identifier does not exist
    async fn resolve(&self, kind: IdentifierKind, value: &str)
    -> Result<Option<i64>, PostgresError>;
}

/// Resolver backed by the lookup tables
pub struct PgIdentifierResolver<'a> {
    pool: &'a PgPool,
}

impl<'a> PgIdentifierResolver<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentifierResolver for PgIdentifierResolver<'_> {
    async fn resolve(
        &self,
        kind: IdentifierKind,
        value: &str,
    ) -> Result<Option<i64>, PostgresError> {
        let row: Option<(i64,)> = match kind {
            IdentifierKind::Resource => {
                sqlx::query_as("SELECT id FROM resources WHERE resource_id = $1")
                    .bind(value)
                    .fetch_optional(self.pool)
                    .await?
            }
            IdentifierKind::Source => {
                sqlx::query_as("SELECT id FROM sources WHERE name = $1")
                    .bind(value)
                    .fetch_optional(self.pool)
                    .await?
            }
            IdentifierKind::Meter => {
                sqlx::query_as("SELECT id FROM meters WHERE name = $1")
                    .bind(value)
                    .fetch_optional(self.pool)
                    .await?
            }
            IdentifierKind::User | IdentifierKind::Project => {
                let Ok(uuid) = uuid::Uuid::parse_str(value.trim()) else {
                    return Ok(None);
                };
                let sql = if kind == IdentifierKind::User {
                    "SELECT id FROM users WHERE uuid = $1"
                } else {
                    "SELECT id FROM projects WHERE uuid = $1"
                };
                sqlx::query_as(sql)
                    .bind(uuid)
                    .fetch_optional(self.pool)
                    .await?
            }
        };
        Ok(row.map(|(id,)| id))
    }
}

/// Compile a flat filter against the samples table using surrogate keys.
///
/// Resolution order is meter, resource, user, project, source; the first
/// identifier that does not resolve short-circuits with
/// [`EmptyReason::MissingReference`].
pub async fn compile_resource_filter<R: IdentifierResolver + ?Sized>(
    resolver: &R,
    filter: &FlatFilter,
) -> Result<Compilation, PostgresError> {
    let mut conditions = Vec::new();

    for (kind, value) in [
        (IdentifierKind::Meter, &filter.meter),
        (IdentifierKind::Resource, &filter.resource),
        (IdentifierKind::User, &filter.user),
        (IdentifierKind::Project, &filter.project),
        (IdentifierKind::Source, &filter.source),
    ] {
        let Some(value) = value else { continue };
        match resolver.resolve(kind, value).await? {
            Some(id) => conditions.push(Condition::compare(
                kind.sample_column(),
                "=",
                SqlValue::Int(id),
                ConditionKind::Field,
            )),
            None => {
                return Ok(Compilation::Empty(EmptyReason::MissingReference(
                    kind.name(),
                )));
            }
        }
    }

    if let Some(message_id) = &filter.message_id {
        conditions.push(Condition::compare(
            "samples.message_id",
            "=",
            SqlValue::Text(message_id.clone()),
            ConditionKind::Field,
        ));
    }
    conditions.extend(range_conditions(filter, "samples.timestamp"));
    if let Some(condition) = metaquery_condition(&filter.metaquery)? {
        conditions.push(condition);
    }

    Ok(Compilation::Query(join_conditions(&conditions)))
}

fn resources_query(where_clause: &str) -> String {
    format!(
        "SELECT resources.resource_id, sources.name as source, \
         users.uuid as user_id, projects.uuid as project_id, s.min_ts, s.max_ts \
         FROM (SELECT samples.resource_id, samples.source_id, samples.user_id, \
               samples.project_id, min(samples.timestamp) as min_ts, \
               max(samples.timestamp) as max_ts \
               FROM samples{} \
               GROUP BY samples.resource_id, samples.source_id, samples.user_id, \
               samples.project_id) as s \
         JOIN resources ON s.resource_id = resources.id \
         LEFT JOIN users ON s.user_id = users.id \
         LEFT JOIN projects ON s.project_id = projects.id \
         LEFT JOIN sources ON s.source_id = sources.id",
        where_clause
    )
}

/// Resources with samples matching a flat filter
pub async fn get_resources(
    pool: &PgPool,
    filter: &FlatFilter,
) -> Result<Vec<ResourceRow>, PostgresError> {
    let resolver = PgIdentifierResolver::new(pool);
    let compilation = compile_resource_filter(&resolver, filter).await?;

    // the filter lands inside the subselect, so splice it before wrapping
    let compilation = match compilation {
        Compilation::Query(mut query) => {
            query.where_clause = resources_query(&query.where_clause);
            Compilation::Query(query)
        }
        empty => empty,
    };
    fetch_compiled(pool, "", compilation, resource_from_row).await
}

fn resource_from_row(row: &PgRow) -> Result<ResourceRow, sqlx::Error> {
    Ok(ResourceRow {
        resource_id: row.try_get("resource_id")?,
        source: row.try_get("source")?,
        user_id: row.try_get("user_id")?,
        project_id: row.try_get("project_id")?,
        first_sample_timestamp: row.try_get("min_ts")?,
        last_sample_timestamp: row.try_get("max_ts")?,
    })
}
