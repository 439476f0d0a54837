//! Unified error type for data layer
//!
//! Wraps backend errors. Filter validation errors pass through unchanged.

use thiserror::Error;

use crate::data::filters::FilterError;

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// PostgreSQL database error
    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    /// Filter rejected before any SQL was sent
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataError {
    pub fn from_postgres(e: sqlx::Error) -> Self {
        Self::Postgres(e)
    }
}

/// Convert from the PostgresError type
impl From<crate::data::postgres::PostgresError> for DataError {
    fn from(e: crate::data::postgres::PostgresError) -> Self {
        match e {
            crate::data::postgres::PostgresError::Database(e) => Self::from_postgres(e),
            crate::data::postgres::PostgresError::Filter(e) => Self::Filter(e),
            crate::data::postgres::PostgresError::Config(msg) => Self::Config(msg),
        }
    }
}
