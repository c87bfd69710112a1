//! Database configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults, or built in code with the builder-style setters.
//!
//! ## Environment
//! ```text
//! DATABASE_URL             writer database (required)      sqlite://data/dropship.db
//! REPLICA_URL              read replica (optional)         defaults to DATABASE_URL
//! DB_MAX_CONNECTIONS       per pool                        5
//! DB_MIN_CONNECTIONS       per pool                        1
//! DB_CONNECT_TIMEOUT_SECS  acquire timeout                 30
//! DEFAULT_MAX_DIGITS       NUMERIC precision of amounts    12
//! DEFAULT_DECIMAL_PLACES   NUMERIC scale of amounts        2
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use dropship_core::{DEFAULT_DECIMAL_PLACES, DEFAULT_MAX_DIGITS};
use uuid::Uuid;

/// Database configuration.
///
/// ## Example
/// ```rust
/// use dropship_db::DbConfig;
///
/// let config = DbConfig::new("sqlite://data/dropship.db")
///     .replica_url("sqlite://data/dropship-replica.db")
///     .max_connections(10);
/// assert_eq!(config.max_connections, 10);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Connection URL of the writer (primary) database.
    pub writer_url: String,

    /// Connection URL of the read replica. `None` → the writer URL.
    pub replica_url: Option<String>,

    /// Maximum number of connections in each pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive in each pool.
    /// Default: 1
    pub min_connections: u32,

    /// Connection acquire timeout.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on the writer at connect time.
    /// Default: true
    pub run_migrations: bool,

    /// Total digits allowed in a stored amount.
    /// Default: 12
    pub max_digits: u32,

    /// Fractional digits allowed in a stored amount.
    /// Default: 2
    pub decimal_places: u32,
}

impl DbConfig {
    /// Creates a configuration with the given writer URL and defaults.
    pub fn new(writer_url: impl Into<String>) -> Self {
        DbConfig {
            writer_url: writer_url.into(),
            replica_url: None,
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            max_digits: DEFAULT_MAX_DIGITS,
            decimal_places: DEFAULT_DECIMAL_PLACES,
        }
    }

    /// Creates an in-memory configuration (for testing).
    ///
    /// Both pools attach to the same named shared-cache database, so rows
    /// committed through the writer are visible through the replica.
    pub fn in_memory() -> Self {
        let url = format!(
            "sqlite:file:dropship-{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        );
        DbConfig {
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            ..DbConfig::new(url)
        }
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let writer_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingRequired("DATABASE_URL".to_string()))?;
        let defaults = DbConfig::new(writer_url);

        let config = DbConfig {
            replica_url: env::var("REPLICA_URL").ok().filter(|url| !url.is_empty()),
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_or("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connect_timeout: Duration::from_secs(env_or(
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout.as_secs(),
            )?),
            max_digits: env_or("DEFAULT_MAX_DIGITS", defaults.max_digits)?,
            decimal_places: env_or("DEFAULT_DECIMAL_PLACES", defaults.decimal_places)?,
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks URL schemes and numeric bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme("DATABASE_URL", &self.writer_url)?;
        if let Some(url) = &self.replica_url {
            check_scheme("REPLICA_URL", url)?;
        }

        if self.max_connections == 0 || self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }

        if self.decimal_places > self.max_digits {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_DECIMAL_PLACES".to_string(),
            ));
        }

        Ok(())
    }

    /// Returns the URL the replica pool connects to.
    pub fn effective_replica_url(&self) -> &str {
        self.replica_url.as_deref().unwrap_or(&self.writer_url)
    }

    /// Sets the replica URL.
    pub fn replica_url(mut self, url: impl Into<String>) -> Self {
        self.replica_url = Some(url.into());
        self
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Sets the stored precision of amounts.
    pub fn precision(mut self, max_digits: u32, decimal_places: u32) -> Self {
        self.max_digits = max_digits;
        self.decimal_places = decimal_places;
        self
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

fn check_scheme(name: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("sqlite:") {
        Ok(())
    } else {
        Err(ConfigError::UnsupportedScheme {
            name: name.to_string(),
            url: url.to_string(),
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("{name} must be a sqlite: connection string, got '{url}'")]
    UnsupportedScheme { name: String, url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("sqlite://tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .precision(14, 4);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_digits, 14);
        assert_eq!(config.decimal_places, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_replica_defaults_to_writer() {
        let config = DbConfig::new("sqlite://a.db");
        assert_eq!(config.effective_replica_url(), "sqlite://a.db");

        let config = config.replica_url("sqlite://b.db");
        assert_eq!(config.effective_replica_url(), "sqlite://b.db");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = DbConfig::new("postgresql://localhost/dropship");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedScheme { .. })
        ));

        let config = DbConfig::new("sqlite://a.db").max_connections(0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let config = DbConfig::new("sqlite://a.db").precision(2, 4);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_in_memory_configs_are_isolated() {
        let a = DbConfig::in_memory();
        let b = DbConfig::in_memory();
        assert_ne!(a.writer_url, b.writer_url);
        assert_eq!(a.effective_replica_url(), a.writer_url);
    }
}
