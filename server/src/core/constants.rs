// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME: &str = "meterstore";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".meterstore";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "meterstore.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "METERSTORE_CONFIG";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "METERSTORE_LOG";

/// Environment variable for PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "METERSTORE_POSTGRES_URL";

/// Environment variable for the default row limit of listing commands
pub const ENV_DEFAULT_LIMIT: &str = "METERSTORE_DEFAULT_LIMIT";

// =============================================================================
// PostgreSQL Database
// =============================================================================

/// PostgreSQL default max connections
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// PostgreSQL default min connections (keep warm for low latency)
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// PostgreSQL default connection acquire timeout in seconds
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// PostgreSQL idle connection timeout in seconds
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// PostgreSQL max connection lifetime in seconds
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// PostgreSQL statement timeout in seconds
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Query Limits
// =============================================================================

/// Maximum size of a JSON filter document in bytes
pub const QUERY_DEFAULT_MAX_FILTER_JSON_BYTES: usize = 64 * 1024;

/// Maximum nesting depth of a filter tree
pub const QUERY_MAX_FILTER_DEPTH: usize = 32;
