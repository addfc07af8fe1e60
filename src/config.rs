//! Configuration handling for the ODBC MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! The database settings are read once at startup into a [`DatabaseConfig`] value that is
//! handed to the connection manager; nothing here is process-global.

use crate::db::bridge::BridgeConfig;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CLOSE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ENCRYPT: &str = "no";
pub const DEFAULT_TRUST_SERVER_CERT: &str = "yes";
pub const DEFAULT_DRIVER_NAME: &str = "ODBC Driver 17 for SQL Server";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// HTTP with Server-Sent Events (for web clients)
    Http,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Settings for the single SQL Server connection.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub server: String,
    pub database: String,
    pub user: String,
    /// Sensitive - never logged, masked in Debug and redacted connection strings.
    pub password: String,
    pub connect_timeout: Duration,
    /// How long shutdown waits for in-flight driver work before abandoning the connection
    pub close_timeout: Duration,
    pub encrypt: String,
    pub trust_server_cert: String,
    pub driver_name: String,
}

impl DatabaseConfig {
    /// Build the ODBC connection string for the driver manager.
    pub fn connection_string(&self) -> String {
        self.render_connection_string(&self.password)
    }

    /// Connection string with the password masked, safe for logs.
    pub fn redacted_connection_string(&self) -> String {
        self.render_connection_string("***")
    }

    fn render_connection_string(&self, password: &str) -> String {
        format!(
            "DRIVER={{{}}};SERVER={};DATABASE={};UID={};PWD={};Encrypt={};TrustServerCertificate={};Connection Timeout={};",
            self.driver_name,
            odbc_value(&self.server),
            odbc_value(&self.database),
            odbc_value(&self.user),
            odbc_value(password),
            odbc_value(&self.encrypt),
            odbc_value(&self.trust_server_cert),
            self.connect_timeout.as_secs(),
        )
    }

    /// Check the settings that must be present before a connect attempt makes sense.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.trim().is_empty() {
            return Err("SQL_SERVER is not set".to_string());
        }
        if self.driver_name.trim().is_empty() {
            return Err("SQL_DRIVER_NAME must not be empty".to_string());
        }
        if self.connect_timeout.is_zero() {
            return Err("SQL_CONNECT_TIMEOUT_SECONDS must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("connect_timeout", &self.connect_timeout)
            .field("close_timeout", &self.close_timeout)
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("driver_name", &self.driver_name)
            .finish()
    }
}

/// Quote an attribute value when it contains characters the ODBC
/// connection-string grammar treats specially.
fn odbc_value(value: &str) -> String {
    let needs_braces = value.contains([';', '{', '}'])
        || value.starts_with(' ')
        || value.ends_with(' ');
    if needs_braces {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}

/// Configuration for the ODBC MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "odbc-mcp-server",
    about = "MCP server exposing SQL Server tools over a single shared ODBC connection",
    version,
    author
)]
pub struct Config {
    /// SQL Server host (and optional ",port" or "\instance")
    #[arg(long, env = "SQL_SERVER", default_value = "")]
    pub server: String,

    /// Database name
    #[arg(long, env = "SQL_DATABASE", default_value = "")]
    pub database: String,

    /// Login user
    #[arg(long, env = "SQL_USER", default_value = "")]
    pub user: String,

    /// Login password
    #[arg(long, env = "SQL_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Connect (login) timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "SQL_CONNECT_TIMEOUT_SECONDS"
    )]
    pub connect_timeout: u64,

    /// Seconds shutdown waits for in-flight driver work before abandoning the connection
    #[arg(
        long,
        default_value_t = DEFAULT_CLOSE_TIMEOUT_SECS,
        env = "SQL_CLOSE_TIMEOUT_SECONDS"
    )]
    pub close_timeout: u64,

    /// Value of the driver's Encrypt attribute
    #[arg(long, default_value = DEFAULT_ENCRYPT, env = "SQL_ENCRYPT")]
    pub encrypt: String,

    /// Value of the driver's TrustServerCertificate attribute
    #[arg(long, default_value = DEFAULT_TRUST_SERVER_CERT, env = "SQL_TRUST_SERVER_CERT")]
    pub trust_server_cert: String,

    /// ODBC driver name as registered with the driver manager
    #[arg(long, default_value = DEFAULT_DRIVER_NAME, env = "SQL_DRIVER_NAME")]
    pub driver_name: String,

    /// Upper bound on concurrently running blocking driver calls (unbounded when unset)
    #[arg(long, env = "SQL_MAX_BLOCKING_CALLS")]
    pub max_blocking_calls: Option<usize>,

    /// Per-call wait limit in seconds for blocking driver calls (no limit when unset)
    #[arg(long, env = "SQL_CALL_TIMEOUT_SECONDS")]
    pub call_timeout: Option<u64>,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            server: String::new(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            close_timeout: DEFAULT_CLOSE_TIMEOUT_SECS,
            encrypt: DEFAULT_ENCRYPT.to_string(),
            trust_server_cert: DEFAULT_TRUST_SERVER_CERT.to_string(),
            driver_name: DEFAULT_DRIVER_NAME.to_string(),
            max_blocking_calls: None,
            call_timeout: None,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Database settings for the connection manager.
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            server: self.server.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            connect_timeout: self.connect_timeout_duration(),
            close_timeout: Duration::from_secs(self.close_timeout),
            encrypt: self.encrypt.clone(),
            trust_server_cert: self.trust_server_cert.clone(),
            driver_name: self.driver_name.clone(),
        }
    }

    /// Settings for the blocking-call bridge. A zero bound or timeout means "unset".
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            max_in_flight: self.max_blocking_calls.filter(|n| *n > 0),
            call_timeout: self
                .call_timeout
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
