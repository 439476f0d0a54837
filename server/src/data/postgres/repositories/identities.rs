//! User and project repository for PostgreSQL operations

use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::data::filters::flat::{join_conditions, text_condition};
use crate::data::filters::{Compilation, CompiledQuery};
use crate::data::postgres::PostgresError;
use crate::data::postgres::query::fetch_compiled;

/// Lookup tables holding external owner identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerTable {
    Users,
    Projects,
}

impl OwnerTable {
    fn table(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Projects => "projects",
        }
    }

    fn base_query(&self) -> String {
        let table = self.table();
        format!(
            "SELECT {table}.uuid FROM {table} LEFT JOIN sources ON {table}.source_id = sources.id"
        )
    }
}

/// Optional source restriction over an owner table
pub fn compile_source_filter(source: Option<&str>) -> CompiledQuery {
    let conditions: Vec<_> = source
        .map(|source| text_condition("sources.name", source))
        .into_iter()
        .collect();
    join_conditions(&conditions)
}

/// Known user ids, optionally only those of one source
pub async fn get_users(
    pool: &PgPool,
    source: Option<&str>,
) -> Result<Vec<Uuid>, PostgresError> {
    get_owners(pool, OwnerTable::Users, source).await
}

/// Known project ids, optionally only those of one source
pub async fn get_projects(
    pool: &PgPool,
    source: Option<&str>,
) -> Result<Vec<Uuid>, PostgresError> {
    get_owners(pool, OwnerTable::Projects, source).await
}

async fn get_owners(
    pool: &PgPool,
    owners: OwnerTable,
    source: Option<&str>,
) -> Result<Vec<Uuid>, PostgresError> {
    let compilation = Compilation::Query(compile_source_filter(source));
    let ids = fetch_compiled(pool, &owners.base_query(), compilation, owner_from_row).await?;
    // rows without an external id are not listable
    Ok(ids.into_iter().flatten().collect())
}

fn owner_from_row(row: &PgRow) -> Result<Option<Uuid>, sqlx::Error> {
    row.try_get("uuid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filters::SqlValue;

    #[test]
    fn test_all_owners() {
        let query = compile_source_filter(None);
        assert_eq!(query.where_clause, "");
        assert!(query.parameters.is_empty());
    }

    #[test]
    fn test_owners_of_one_source() {
        let query = compile_source_filter(Some("openstack"));
        assert_eq!(query.where_clause, " where sources.name = %s");
        assert_eq!(query.parameters, vec![SqlValue::Text("openstack".into())]);
    }

    #[test]
    fn test_base_queries() {
        assert_eq!(
            OwnerTable::Users.base_query(),
            "SELECT users.uuid FROM users LEFT JOIN sources ON users.source_id = sources.id"
        );
        assert_eq!(
            OwnerTable::Projects.base_query(),
            "SELECT projects.uuid FROM projects \
             LEFT JOIN sources ON projects.source_id = sources.id"
        );
    }
}
