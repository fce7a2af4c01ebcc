//! Configuration management for alertreach
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, an `alertreach.toml` file, environment variables
//! and command-line flags.

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// The configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "alertreach.toml";

const ENV_PREFIX: &str = "ALERTREACH_";

/// String settings taken verbatim from the environment. figment reads env
/// values like TOML, so a password such as `007` would otherwise arrive as
/// the integer 7.
const STRING_ENV_KEYS: &[&str] = &[
    "log_level",
    "zabbix.url",
    "zabbix.username",
    "zabbix.password",
    "zabbix.api_token",
];

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Configuration for the HTTP server.
    pub server: ServerConfig,
    /// Connection settings for the monitoring server API.
    pub zabbix: ZabbixConfig,
    /// Report rendering options.
    pub report: ReportConfig,
    /// Configuration for the Prometheus metrics endpoint.
    pub metrics: MetricsConfig,
}

/// Configuration for the HTTP server.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// The address the web interface listens on.
    pub listen_address: SocketAddr,
}

/// Connection settings for the monitoring server API.
#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct ZabbixConfig {
    /// Server URL or address; the scheme and `api_jsonrpc.php` are optional.
    pub url: String,
    pub username: String,
    pub password: String,
    /// An API token used instead of username and password when set.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Timeout for a single API request in milliseconds.
    pub timeout_ms: u64,
    /// Whether to verify the server's TLS certificate.
    pub validate_certs: bool,
}

impl fmt::Debug for ZabbixConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZabbixConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_ms", &self.timeout_ms)
            .field("validate_certs", &self.validate_certs)
            .finish()
    }
}

/// Report rendering options.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReportConfig {
    /// Render recipients that have no access to the host. Off by default.
    pub show_unavailable: bool,
}

/// Configuration for the Prometheus metrics endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct MetricsConfig {
    /// Serve `/metrics` from the web interface.
    pub enabled: bool,
}

impl Config {
    /// Loads the application configuration by layering defaults, the TOML
    /// file, `ALERTREACH_` environment variables and command-line flags.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // Nested keys use a double underscore, e.g. ALERTREACH_ZABBIX__URL
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(string_env_overrides())
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

/// Re-reads the string settings from the environment without type parsing.
fn string_env_overrides() -> Figment {
    STRING_ENV_KEYS.iter().fold(Figment::new(), |figment, key| {
        let var = format!("{}{}", ENV_PREFIX, key.to_uppercase().replace('.', "__"));
        match std::env::var(&var) {
            Ok(value) => figment.merge(Serialized::default(key, value)),
            Err(_) => figment,
        }
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                listen_address: SocketAddr::from(([127, 0, 0, 1], 5000)),
            },
            zabbix: ZabbixConfig {
                url: "127.0.0.1".to_string(),
                username: "Admin".to_string(),
                password: "zabbix".to_string(),
                api_token: None,
                timeout_ms: 10_000,
                validate_certs: false,
            },
            report: ReportConfig {
                show_unavailable: false,
            },
            metrics: MetricsConfig { enabled: false },
        }
    }
}
