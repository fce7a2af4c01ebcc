//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `alertreach.toml` file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::net::SocketAddr;
use std::path::PathBuf;

/// A web interface showing who gets notified when a monitored host's triggers fire.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address for the web interface to listen on.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// URL or address of the monitoring server.
    #[arg(long, value_name = "URL")]
    pub zabbix_url: Option<String>,

    /// Username for the monitoring server API.
    #[arg(long, value_name = "USER")]
    pub zabbix_user: Option<String>,

    /// Logging level (e.g. "debug", "info").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Also list recipients that have no access to the host.
    #[arg(long)]
    pub show_unavailable: bool,

    /// Serve Prometheus metrics at /metrics.
    #[arg(long)]
    pub metrics: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(addr) = self.listen {
            insert_nested(&mut dict, "server.listen_address", Value::from(addr.to_string()));
        }
        if let Some(url) = &self.zabbix_url {
            insert_nested(&mut dict, "zabbix.url", Value::from(url.clone()));
        }
        if let Some(user) = &self.zabbix_user {
            insert_nested(&mut dict, "zabbix.username", Value::from(user.clone()));
        }
        if let Some(level) = &self.log_level {
            insert_nested(&mut dict, "log_level", Value::from(level.clone()));
        }

        // Flags only override when present; absence leaves lower layers alone.
        if self.show_unavailable {
            insert_nested(&mut dict, "report.show_unavailable", Value::from(true));
        }
        if self.metrics {
            insert_nested(&mut dict, "metrics.enabled", Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

/// Inserts `value` at a dotted `path`, creating intermediate tables.
fn insert_nested(dict: &mut Dict, path: &str, value: Value) {
    match path.split_once('.') {
        Some((head, rest)) => {
            let entry = dict
                .entry(head.to_string())
                .or_insert_with(|| Value::Dict(Tag::default(), Dict::new()));
            if let Value::Dict(_, inner) = entry {
                insert_nested(inner, rest, value);
            }
        }
        None => {
            dict.insert(path.to_string(), value);
        }
    }
}
