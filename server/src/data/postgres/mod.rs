//! PostgreSQL sample store
//!
//! Owns the connection pool and the read-side repositories. The schema is
//! managed by the collector that writes samples; this service only reads.

pub mod error;
pub mod query;
pub mod repositories;

pub use error::PostgresError;
pub use sqlx::PgPool;

use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::log::LevelFilter;

use crate::core::config::PostgresConfig;
use crate::core::constants::{
    POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS, POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_MAX_CONNECTIONS, POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
    POSTGRES_DEFAULT_MIN_CONNECTIONS, POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

/// Pool settings after zero values fall back to defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PoolSettings {
    max_connections: u32,
    min_connections: u32,
    acquire_timeout_secs: u64,
    idle_timeout_secs: u64,
    max_lifetime_secs: u64,
    statement_timeout_secs: u64,
}

impl PoolSettings {
    fn resolve(config: &PostgresConfig) -> Self {
        fn or_default<T: PartialEq + Default>(value: T, default: T) -> T {
            if value == T::default() { default } else { value }
        }

        let max_connections =
            or_default(config.max_connections, POSTGRES_DEFAULT_MAX_CONNECTIONS);
        Self {
            max_connections,
            // never keep more warm than the pool may hold
            min_connections: or_default(config.min_connections, POSTGRES_DEFAULT_MIN_CONNECTIONS)
                .min(max_connections),
            acquire_timeout_secs: or_default(
                config.acquire_timeout_secs,
                POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS,
            ),
            idle_timeout_secs: or_default(
                config.idle_timeout_secs,
                POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS,
            ),
            max_lifetime_secs: or_default(
                config.max_lifetime_secs,
                POSTGRES_DEFAULT_MAX_LIFETIME_SECS,
            ),
            statement_timeout_secs: or_default(
                config.statement_timeout_secs,
                POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
            ),
        }
    }
}

/// PostgreSQL database service
///
/// Created once at startup and shared by every command.
pub struct PostgresService {
    pool: PgPool,
}

impl PostgresService {
    /// Connect a pool from configuration
    pub async fn init(config: &PostgresConfig) -> Result<Self, PostgresError> {
        let url = config.url.as_str();
        if url.is_empty() {
            return Err(PostgresError::Config("PostgreSQL URL is required".into()));
        }

        let settings = PoolSettings::resolve(config);

        let mut options: PgConnectOptions = url
            .parse()
            .map_err(|e| PostgresError::Config(format!("Invalid PostgreSQL URL: {}", e)))?;

        options = options.log_statements(LevelFilter::Trace);
        options = options.options([(
            "statement_timeout",
            format!("{}s", settings.statement_timeout_secs),
        )]);

        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(settings.max_lifetime_secs))
            .connect_with(options)
            .await?;

        tracing::debug!(
            max_connections = settings.max_connections,
            min_connections = settings.min_connections,
            acquire_timeout_secs = settings.acquire_timeout_secs,
            statement_timeout_secs = settings.statement_timeout_secs,
            "PostgresService initialized"
        );
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("PostgreSQL pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_settings_use_defaults() {
        let settings = PoolSettings::resolve(&PostgresConfig::default());
        assert_eq!(settings.max_connections, POSTGRES_DEFAULT_MAX_CONNECTIONS);
        assert_eq!(settings.min_connections, POSTGRES_DEFAULT_MIN_CONNECTIONS);
        assert_eq!(
            settings.statement_timeout_secs,
            POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS
        );
    }

    #[test]
    fn test_min_connections_capped_by_max() {
        let config = PostgresConfig {
            max_connections: 1,
            min_connections: 5,
            ..Default::default()
        };
        let settings = PoolSettings::resolve(&config);
        assert_eq!(settings.max_connections, 1);
        assert_eq!(settings.min_connections, 1);
    }

    #[tokio::test]
    async fn test_empty_url_is_config_error() {
        let result = PostgresService::init(&PostgresConfig::default()).await;
        assert!(matches!(result, Err(PostgresError::Config(_))));
    }
}
