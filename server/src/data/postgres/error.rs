//! PostgreSQL error types

use thiserror::Error;

use crate::data::filters::FilterError;

#[derive(Error, Debug)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Configuration error: {0}")]
    Config(String),
}
