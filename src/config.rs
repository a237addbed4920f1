//! Application configuration loaded from environment variables and a TOML file.
//!
//! # Bind Address
//!
//! The listen address comes from one of two places:
//!
//! - `CLEAR_SKY` unset: the `[server]` table of the config file
//!   (`CONFIG_FILE`, default `config.toml`), keys `ip` and `port`
//! - `CLEAR_SKY` set: the `CLEAR_SKY_IP` and `CLEAR_SKY_PORT` variables
//!
//! A missing IP or port is a configuration error.
//!
//! # Authorization
//!
//! - `API_ENVIRONMENT`: environment tag sent with every key lookup (default: `prod`)
//! - `API_SERVER_ENDPOINT`: base URL of the authorization service and upstream API
//! - `API_KEY`: service credential presented on outbound calls
//!
//! # Rate Limiting
//!
//! - `STATUS_RATE_LIMIT`: requests per second on `/status` (default: 10)
//! - `GATED_RATE_LIMIT`: requests per second on gated and stats-serving routes (default: 1)
//!
//! Either may be set to 0 to disable that tier.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::{AppError, AppResult};

/// Where the bind address was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindSource {
    /// `[server]` table of a TOML file
    ConfigFile(PathBuf),
    /// `CLEAR_SKY_IP` / `CLEAR_SKY_PORT`
    Environment,
}

impl fmt::Display for BindSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindSource::ConfigFile(path) => write!(f, "config file {}", path.display()),
            BindSource::Environment => write!(f, "environment variables"),
        }
    }
}

/// Application configuration.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Where `host` and `port` came from
    pub bind_source: BindSource,

    /// Directory holding static assets and snapshot files (default: "static")
    pub static_dir: PathBuf,

    /// Directory holding HTML templates (default: "templates")
    pub template_dir: PathBuf,

    /// Maximum request body size in bytes (default: 10MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Host Redirect
    // =========================================================================
    /// Hostname that is permanently redirected (default: "bsky.thieflord.dev")
    pub legacy_host: String,

    /// Redirect target hostname (default: "clearsky.app")
    pub canonical_host: String,

    // =========================================================================
    // Authorization / Upstream
    // =========================================================================
    /// Environment tag sent to the authorization service
    pub api_environment: String,

    /// Base URL of the authorization service and upstream status API
    pub api_server_endpoint: String,

    /// Service credential sent as `X-API-Key` on outbound calls
    pub service_api_key: Option<String>,

    /// Deadline for outbound calls (None = no deadline)
    pub outbound_timeout: Option<Duration>,

    // =========================================================================
    // Rate Limiting
    // =========================================================================
    /// Requests per second on the liveness route (0 = disabled)
    pub status_rate_limit: u32,

    /// Requests per second on gated and stats-serving routes (0 = disabled)
    pub gated_rate_limit: u32,

    // =========================================================================
    // Snapshots
    // =========================================================================
    /// Write snapshots to a temp file and rename instead of overwriting in place
    pub atomic_snapshot_writes: bool,

    // =========================================================================
    // Observability
    // =========================================================================
    /// Log filter directives (e.g., "info", "clearsky_ui_server=debug").
    /// Read from `RUST_LOG`, including one set in `.env`.
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (0 = disabled)
    pub metrics_port: u16,
}

/// On-disk configuration file layout.
#[derive(Debug, Deserialize)]
struct FileConfig {
    server: Option<ServerSection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    ip: Option<String>,
    port: Option<u16>,
}

impl Config {
    /// Load configuration from the environment (and the config file when
    /// `CLEAR_SKY` is unset).
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the bind address is missing or any
    /// value fails to parse.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let (host, port, bind_source) = Self::resolve_bind_address()?;

        let outbound_timeout_secs: u64 = Self::parse_env("OUTBOUND_TIMEOUT_SECS", 0)?;

        let config = Self {
            host,
            port,
            bind_source,
            static_dir: PathBuf::from(env::var("STATIC_DIR").unwrap_or_else(|_| "static".into())),
            template_dir: PathBuf::from(
                env::var("TEMPLATE_DIR").unwrap_or_else(|_| "templates".into()),
            ),
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 10 * 1024 * 1024)?,

            legacy_host: env::var("LEGACY_HOST").unwrap_or_else(|_| "bsky.thieflord.dev".into()),
            canonical_host: env::var("CANONICAL_HOST").unwrap_or_else(|_| "clearsky.app".into()),

            api_environment: env::var("API_ENVIRONMENT").unwrap_or_else(|_| "prod".into()),
            api_server_endpoint: env::var("API_SERVER_ENDPOINT")
                .unwrap_or_else(|_| "https://api.clearsky.services".into())
                .trim_end_matches('/')
                .to_string(),
            service_api_key: env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            outbound_timeout: (outbound_timeout_secs > 0)
                .then(|| Duration::from_secs(outbound_timeout_secs)),

            status_rate_limit: Self::parse_env("STATUS_RATE_LIMIT", 10)?,
            gated_rate_limit: Self::parse_env("GATED_RATE_LIMIT", 1)?,

            atomic_snapshot_writes: Self::parse_env("ATOMIC_SNAPSHOT_WRITES", false)?,

            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 0)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Pick the bind address source based on `CLEAR_SKY`.
    fn resolve_bind_address() -> AppResult<(String, u16, BindSource)> {
        if env::var_os("CLEAR_SKY").is_some() {
            let host = env::var("CLEAR_SKY_IP")
                .ok()
                .filter(|h| !h.is_empty())
                .ok_or_else(|| AppError::ConfigError("No IP configured (CLEAR_SKY_IP)".into()))?;
            let port = env::var("CLEAR_SKY_PORT")
                .map_err(|_| AppError::ConfigError("No port configured (CLEAR_SKY_PORT)".into()))?
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid CLEAR_SKY_PORT: {e}")))?;
            return Ok((host, port, BindSource::Environment));
        }

        let path = PathBuf::from(env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into()));
        let (host, port) = Self::load_bind_file(&path)?;
        Ok((host, port, BindSource::ConfigFile(path)))
    }

    /// Read `[server] ip` and `port` from a TOML file.
    fn load_bind_file(path: &Path) -> AppResult<(String, u16)> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Cannot read {}: {e}", path.display()))
        })?;
        parse_bind_section(&contents)
    }

    /// Validate configuration values for consistency and correctness.
    fn validate(&self) -> AppResult<()> {
        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        if !self.api_server_endpoint.starts_with("http://")
            && !self.api_server_endpoint.starts_with("https://")
        {
            return Err(AppError::ConfigError(format!(
                "API_SERVER_ENDPOINT must be an http(s) URL, got {:?}",
                self.api_server_endpoint
            )));
        }

        if self.legacy_host.eq_ignore_ascii_case(&self.canonical_host) {
            return Err(AppError::ConfigError(
                "LEGACY_HOST and CANONICAL_HOST must differ".to_string(),
            ));
        }

        Ok(())
    }

    /// Log filter for the subscriber. Directives that fail to parse fall
    /// back to `info`.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_level).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if a service credential is configured for outbound calls.
    pub fn service_key_configured(&self) -> bool {
        self.service_api_key.is_some()
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }
}

/// Parse the `[server]` table of a config file into an address pair.
fn parse_bind_section(contents: &str) -> AppResult<(String, u16)> {
    let parsed: FileConfig = toml::from_str(contents)
        .map_err(|e| AppError::ConfigError(format!("Invalid config file: {e}")))?;

    let server = parsed
        .server
        .ok_or_else(|| AppError::ConfigError("Config file has no [server] table".into()))?;

    let ip = server
        .ip
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| AppError::ConfigError("No IP configured ([server] ip)".into()))?;
    let port = server
        .port
        .ok_or_else(|| AppError::ConfigError("No port configured ([server] port)".into()))?;

    Ok((ip, port))
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            bind_source: BindSource::Environment,
            static_dir: PathBuf::from("static"),
            template_dir: PathBuf::from("templates"),
            max_request_body_size: 10 * 1024 * 1024,
            legacy_host: "bsky.thieflord.dev".to_string(),
            canonical_host: "clearsky.app".to_string(),
            api_environment: "prod".to_string(),
            api_server_endpoint: "https://api.clearsky.services".to_string(),
            service_api_key: None,
            outbound_timeout: None,
            status_rate_limit: 10,
            gated_rate_limit: 1,
            atomic_snapshot_writes: false,
            log_level: "info".to_string(),
            metrics_port: 0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();

        assert_eq!(config.status_rate_limit, 10);
        assert_eq!(config.gated_rate_limit, 1);
        assert_eq!(config.api_environment, "prod");
        assert!(config.outbound_timeout.is_none());
        assert!(!config.atomic_snapshot_writes);
        assert!(!config.service_key_configured());
    }

    #[test]
    fn test_server_addr_format() {
        let config = Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ..Config::default()
        };

        assert_eq!(config.server_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_parse_bind_section() {
        let contents = r#"
            [server]
            ip = "10.0.0.5"
            port = 5001
        "#;

        let (ip, port) = parse_bind_section(contents).unwrap();
        assert_eq!(ip, "10.0.0.5");
        assert_eq!(port, 5001);
    }

    #[test]
    fn test_parse_bind_section_missing_port() {
        let err = parse_bind_section("[server]\nip = \"0.0.0.0\"\n").unwrap_err();
        assert!(err.to_string().contains("No port configured"));
    }

    #[test]
    fn test_parse_bind_section_missing_table() {
        let err = parse_bind_section("[logging]\nlevel = \"info\"\n").unwrap_err();
        assert!(err.to_string().contains("[server]"));
    }

    #[test]
    fn test_parse_bind_section_empty_ip() {
        let err = parse_bind_section("[server]\nip = \"\"\nport = 1\n").unwrap_err();
        assert!(err.to_string().contains("No IP configured"));
    }

    #[test]
    fn test_validate_rejects_non_http_endpoint() {
        let config = Config {
            api_server_endpoint: "ftp://example".to_string(),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_identical_hosts() {
        let config = Config {
            legacy_host: "Clearsky.App".to_string(),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_addr_disabled_by_default() {
        assert!(Config::default().metrics_addr().is_none());

        let config = Config {
            metrics_port: 9090,
            ..Config::default()
        };
        assert_eq!(config.metrics_addr().unwrap().port(), 9090);
    }

    #[test]
    fn test_log_filter_uses_configured_level() {
        let config = Config {
            log_level: "clearsky_ui_server=debug".to_string(),
            ..Config::default()
        };
        assert_eq!(config.log_filter().to_string(), "clearsky_ui_server=debug");
    }

    #[test]
    fn test_log_filter_falls_back_to_info() {
        let config = Config {
            log_level: "clearsky_ui_server=verbose".to_string(),
            ..Config::default()
        };
        assert_eq!(config.log_filter().to_string(), "info");
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }
}
