//! SQL abstraction layer
//!
//! The filter compiler emits positional `%s` placeholders. A dialect renders
//! them into the syntax of the executing backend.

mod dialect;
mod postgres_dialect;

pub use dialect::SqlDialect;
pub use postgres_dialect::PostgresDialect;
