use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::utils::file::expand_path;

use super::cli::CliConfig;
use super::constants::{APP_DOT_FOLDER, CONFIG_FILE_NAME, QUERY_DEFAULT_MAX_FILTER_JSON_BYTES};

// =============================================================================
// File Configuration (JSON)
// =============================================================================

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use METERSTORE_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    pub postgres: Option<PostgresFileConfig>,
}

/// Query configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryFileConfig {
    /// Largest accepted filter document in bytes (default: 65536)
    pub max_filter_json_bytes: Option<usize>,
    /// Row limit for listing commands that pass none (default: unlimited)
    pub default_limit: Option<u32>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub database: Option<DatabaseFileConfig>,
    pub query: Option<QueryFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Top-level keys that match no section
    fn unknown_fields(&self) -> Vec<&str> {
        match &self.extra {
            serde_json::Value::Object(map) => map.keys().map(|k| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        let keys = self.unknown_fields();
        if !keys.is_empty() {
            tracing::warn!(
                fields = %keys.join(", "),
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(postgres) = other.database.and_then(|d| d.postgres) {
            let current = self
                .database
                .get_or_insert_with(DatabaseFileConfig::default)
                .postgres
                .get_or_insert_with(PostgresFileConfig::default);
            if postgres.url.is_some() {
                tracing::trace!("Merging database.postgres.url");
                current.url = postgres.url;
            }
            if postgres.max_connections.is_some() {
                current.max_connections = postgres.max_connections;
            }
            if postgres.min_connections.is_some() {
                current.min_connections = postgres.min_connections;
            }
            if postgres.acquire_timeout_secs.is_some() {
                current.acquire_timeout_secs = postgres.acquire_timeout_secs;
            }
            if postgres.idle_timeout_secs.is_some() {
                current.idle_timeout_secs = postgres.idle_timeout_secs;
            }
            if postgres.max_lifetime_secs.is_some() {
                current.max_lifetime_secs = postgres.max_lifetime_secs;
            }
            if postgres.statement_timeout_secs.is_some() {
                current.statement_timeout_secs = postgres.statement_timeout_secs;
            }
        }

        if let Some(query) = other.query {
            let current = self.query.get_or_insert_with(QueryFileConfig::default);
            if query.max_filter_json_bytes.is_some() {
                tracing::trace!(
                    max_filter_json_bytes = ?query.max_filter_json_bytes,
                    "Merging query.max_filter_json_bytes"
                );
                current.max_filter_json_bytes = query.max_filter_json_bytes;
            }
            if query.default_limit.is_some() {
                tracing::trace!(default_limit = ?query.default_limit, "Merging query.default_limit");
                current.default_limit = query.default_limit;
            }
        }
    }
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// PostgreSQL pool settings; zero means "use the default"
#[derive(Debug, Clone, Default)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
    pub statement_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub max_filter_json_bytes: usize,
    pub default_limit: Option<u32>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_filter_json_bytes: QUERY_DEFAULT_MAX_FILTER_JSON_BYTES,
            default_limit: None,
        }
    }
}

impl QueryConfig {
    /// Explicit limit, else the configured default
    pub fn limit(&self, requested: Option<u32>) -> Option<u32> {
        requested.or(self.default_limit)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub postgres: PostgresConfig,
    pub query: QueryConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.meterstore/meterstore.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::layer(file_config, cli);
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then file values, then CLI/env overrides
    fn layer(file_config: FileConfig, cli: &CliConfig) -> Self {
        let file_postgres = file_config
            .database
            .and_then(|d| d.postgres)
            .unwrap_or_default();
        let file_query = file_config.query.unwrap_or_default();

        let postgres = PostgresConfig {
            url: cli
                .postgres_url
                .clone()
                .or(file_postgres.url)
                .unwrap_or_default(),
            max_connections: file_postgres.max_connections.unwrap_or_default(),
            min_connections: file_postgres.min_connections.unwrap_or_default(),
            acquire_timeout_secs: file_postgres.acquire_timeout_secs.unwrap_or_default(),
            idle_timeout_secs: file_postgres.idle_timeout_secs.unwrap_or_default(),
            max_lifetime_secs: file_postgres.max_lifetime_secs.unwrap_or_default(),
            statement_timeout_secs: file_postgres.statement_timeout_secs.unwrap_or_default(),
        };

        let query = QueryConfig {
            max_filter_json_bytes: file_query
                .max_filter_json_bytes
                .unwrap_or(QUERY_DEFAULT_MAX_FILTER_JSON_BYTES),
            default_limit: cli.default_limit.or(file_query.default_limit),
        };

        Self { postgres, query }
    }

    /// Validate the configuration for consistency and correctness
    fn validate(&self) -> Result<()> {
        if self.query.max_filter_json_bytes == 0 {
            anyhow::bail!("Configuration error: query.max_filter_json_bytes must be greater than 0");
        }
        if self.postgres.max_connections > 0
            && self.postgres.min_connections > self.postgres.max_connections
        {
            anyhow::bail!(
                "Configuration error: database.postgres.min_connections ({}) exceeds max_connections ({})",
                self.postgres.min_connections,
                self.postgres.max_connections
            );
        }
        Ok(())
    }
}

/// Get the profile config path (~/.meterstore/meterstore.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "database": { "postgres": { "url": "postgres://localhost/meters", "max_connections": 5 } },
            "query": { "max_filter_json_bytes": 1024, "default_limit": 100 }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let postgres = config.database.as_ref().unwrap().postgres.as_ref().unwrap();
        assert_eq!(postgres.url.as_deref(), Some("postgres://localhost/meters"));
        assert_eq!(postgres.max_connections, Some(5));
        let query = config.query.as_ref().unwrap();
        assert_eq!(query.max_filter_json_bytes, Some(1024));
        assert_eq!(query.default_limit, Some(100));
        assert!(config.unknown_fields().is_empty());
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "query": { "default_limit": 5 }, "databse": {} }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.unknown_fields(), vec!["databse"]);
    }

    #[test]
    fn test_file_config_merge() {
        let mut base: FileConfig = serde_json::from_str(
            r#"{
                "database": { "postgres": { "url": "postgres://profile/db", "max_connections": 5 } },
                "query": { "default_limit": 10 }
            }"#,
        )
        .unwrap();
        let overlay: FileConfig = serde_json::from_str(
            r#"{
                "database": { "postgres": { "url": "postgres://local/db" } },
                "query": { "max_filter_json_bytes": 2048 }
            }"#,
        )
        .unwrap();
        base.merge(overlay);

        let postgres = base.database.unwrap().postgres.unwrap();
        assert_eq!(postgres.url.as_deref(), Some("postgres://local/db"));
        assert_eq!(postgres.max_connections, Some(5));
        let query = base.query.unwrap();
        assert_eq!(query.default_limit, Some(10));
        assert_eq!(query.max_filter_json_bytes, Some(2048));
    }

    #[test]
    fn test_layer_defaults() {
        let config = AppConfig::layer(FileConfig::default(), &CliConfig::default());
        assert_eq!(config.postgres.url, "");
        assert_eq!(config.postgres.max_connections, 0);
        assert_eq!(
            config.query.max_filter_json_bytes,
            QUERY_DEFAULT_MAX_FILTER_JSON_BYTES
        );
        assert_eq!(config.query.default_limit, None);
    }

    #[test]
    fn test_layer_cli_overrides_file() {
        let file: FileConfig = serde_json::from_str(
            r#"{
                "database": { "postgres": { "url": "postgres://file/db" } },
                "query": { "default_limit": 10 }
            }"#,
        )
        .unwrap();
        let cli = CliConfig {
            postgres_url: Some("postgres://cli/db".into()),
            default_limit: Some(50),
            ..Default::default()
        };
        let config = AppConfig::layer(file, &cli);
        assert_eq!(config.postgres.url, "postgres://cli/db");
        assert_eq!(config.query.default_limit, Some(50));
        assert_eq!(config.query.limit(Some(3)), Some(3));
        assert_eq!(config.query.limit(None), Some(50));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "database": {{ "postgres": {{ "url": "postgres://tmp/db" }} }} }}"#
        )
        .unwrap();

        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.postgres.url, "postgres://tmp/db");
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cli = CliConfig {
            config: Some(dir.path().join("absent.json")),
            ..Default::default()
        };
        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_pool_bounds() {
        let mut config = AppConfig::default();
        config.postgres.max_connections = 2;
        config.postgres.min_connections = 4;
        assert!(config.validate().is_err());
    }
}
