//! Data storage layer
//!
//! - `filters` - Filter compilation into parameterized SQL fragments
//! - `sql` - Placeholder rendering per SQL dialect
//! - `types` - Typed rows returned by the repositories
//! - `postgres` - PostgreSQL pool and read-side repositories
//! - `error` - Unified error type for the data layer

pub mod error;
pub mod filters;
pub mod postgres;
pub mod sql;
pub mod types;

pub use error::DataError;
pub use postgres::PostgresService;
