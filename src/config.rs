//! WolfRepl Configuration
//!
//! This module provides configuration structures for the WolfRepl
//! replication administration service.

use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;
use std::time::Duration;

/// Main WolfRepl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolfReplConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Binary log viewer configuration
    #[serde(default)]
    pub binlog: BinlogConfig,

    /// Replication administration configuration
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP API bind address
    #[serde(default = "default_api_address")]
    pub bind_address: String,

    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// MariaDB host
    pub host: String,

    /// MariaDB port
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Database user
    pub user: String,

    /// Database password
    #[serde(default)]
    pub password: String,

    /// Default database (optional)
    #[serde(default)]
    pub database: Option<String>,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Binary log viewer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinlogConfig {
    /// Events per page
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,

    /// Characters of the Info column shown when not in full-query mode
    #[serde(default = "default_limit_chars")]
    pub limit_chars: usize,
}

/// Replication administration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Allow connecting to a user-supplied master server
    #[serde(default)]
    pub allow_arbitrary_server: bool,

    /// Timeout for the candidate master connection in seconds
    #[serde(default = "default_master_connect_timeout")]
    pub master_connect_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_db_port() -> u16 {
    3306
}

fn default_pool_size() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_master_connect_timeout() -> u64 {
    10
}

fn default_max_rows() -> u64 {
    25
}

fn default_limit_chars() -> usize {
    50
}

fn default_api_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_api_address(),
            cors_enabled: false,
        }
    }
}

impl Default for BinlogConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            limit_chars: default_limit_chars(),
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            allow_arbitrary_server: false,
            master_connect_timeout_secs: default_master_connect_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl DatabaseConfig {
    /// Connection options for the configured server. Credentials are passed
    /// as-is, so any character is allowed in the password.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password);
        match &self.database {
            Some(db) => options.database(db),
            None => options,
        }
    }

    /// Connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl WolfReplConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WolfReplConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(crate::Error::Config("server.bind_address cannot be empty".into()));
        }

        if self.database.host.is_empty() {
            return Err(crate::Error::Config("database.host cannot be empty".into()));
        }

        if self.database.user.is_empty() {
            return Err(crate::Error::Config("database.user cannot be empty".into()));
        }

        if self.binlog.max_rows == 0 {
            return Err(crate::Error::Config("binlog.max_rows must be greater than 0".into()));
        }

        Ok(())
    }

    /// Timeout for candidate master connections
    pub fn master_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.replication.master_connect_timeout_secs)
    }

    /// Render a starter configuration file
    pub fn template() -> String {
        r#"# WolfRepl configuration

[server]
bind_address = "0.0.0.0:8080"
cors_enabled = false

[database]
host = "127.0.0.1"
port = 3306
user = "root"
password = ""

[binlog]
max_rows = 25
limit_chars = 50

[replication]
# Allow "change master" to connect to servers entered by the user
allow_arbitrary_server = false
master_connect_timeout_secs = 10

[logging]
level = "info"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
bind_address = "127.0.0.1:9000"

[database]
host = "localhost"
port = 3307
user = "admin"
password = "secret"

[binlog]
max_rows = 50

[replication]
allow_arbitrary_server = true
"#;

        let config = WolfReplConfig::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.binlog.max_rows, 50);
        assert_eq!(config.binlog.limit_chars, 50);
        assert!(config.replication.allow_arbitrary_server);
        assert_eq!(config.master_connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_defaults() {
        let toml = r#"
[database]
host = "db"
user = "root"
"#;
        let config = WolfReplConfig::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.binlog.max_rows, 25);
        assert!(!config.replication.allow_arbitrary_server);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_connect_options_keep_password_verbatim() {
        let toml = r#"
[database]
host = "db"
port = 3307
user = "admin"
password = "p@ss:w#rd/50%"
database = "app"
"#;
        let config = WolfReplConfig::from_str(toml).unwrap();
        let options = format!("{:?}", config.database.connect_options());
        assert!(options.contains(r#""p@ss:w#rd/50%""#));
        assert!(options.contains(r#""db""#));
        assert!(options.contains("3307"));
        assert!(options.contains(r#""app""#));
    }

    #[test]
    fn test_validation() {
        let toml = r#"
[database]
host = ""
user = "root"
"#;
        assert!(WolfReplConfig::from_str(toml).is_err());

        let toml = r#"
[database]
host = "db"
user = "root"

[binlog]
max_rows = 0
"#;
        assert!(matches!(
            WolfReplConfig::from_str(toml),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_template_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(WolfReplConfig::template().as_bytes()).unwrap();

        let config = WolfReplConfig::from_file(file.path()).unwrap();
        assert_eq!(config.database.host, "127.0.0.1");
        assert_eq!(config.database.user, "root");
    }
}
