//! Database configuration module.

use std::env;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,

    /// Maximum connection lifetime in seconds
    pub max_lifetime_secs: u64,
}

impl DatabaseConfig {
    /// Build a pool configuration for `database_url`, reading pool sizing from the environment
    ///
    /// Recognized variables (all optional):
    /// - `DB_MAX_CONNECTIONS` (default: 20)
    /// - `DB_MIN_CONNECTIONS` (default: 2)
    /// - `DB_CONNECTION_TIMEOUT_SECS` (default: 5)
    /// - `DB_IDLE_TIMEOUT_SECS` (default: 300)
    /// - `DB_MAX_LIFETIME_SECS` (default: 1800)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env(database_url: String) -> Self {
        Self {
            database_url,
            max_connections: env_or("DB_MAX_CONNECTIONS", 20),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connection_timeout_secs: env_or("DB_CONNECTION_TIMEOUT_SECS", 5),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }

    /// Create a default configuration for development
    ///
    /// Uses `postgres://postgres@localhost/maskr` as the database URL
    pub fn development() -> Self {
        Self {
            database_url: "postgres://postgres@localhost/maskr".to_string(),
            max_connections: 20,
            min_connections: 2,
            connection_timeout_secs: 5,
            idle_timeout_secs: 300,
            max_lifetime_secs: 1800,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_defaults() {
        let config = DatabaseConfig::default();
        assert!(config.database_url.starts_with("postgres://"));
        assert!(config.max_connections >= config.min_connections);
    }
}
