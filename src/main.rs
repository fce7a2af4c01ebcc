//! alertreach - who gets notified when a host's triggers fire
//!
//! A small web interface that resolves, for every trigger of a monitored
//! host, the actions that would fire and the users they would reach.

use alertreach::{app::App, cli::Cli, config::Config};
use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            tracing_subscriber::fmt().init();
            error!("Failed to load configuration: {}", err);
            std::process::exit(1);
        }
    };

    // RUST_LOG takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("alertreach starting up...");

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.server.listen_address);
    info!("Zabbix URL: {}", config.zabbix.url);
    if config.zabbix.api_token.is_some() {
        info!("Zabbix Auth: API token");
    } else {
        info!("Zabbix Auth: user '{}'", config.zabbix.username);
    }
    info!("Zabbix Timeout: {}ms", config.zabbix.timeout_ms);
    info!("Validate Certificates: {}", config.zabbix.validate_certs);
    info!("Show Unavailable Recipients: {}", config.report.show_unavailable);
    info!(
        "Metrics Endpoint: {}",
        if config.metrics.enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutdown signal received. Shutting down gracefully...");
        shutdown_tx.send(()).ok();
    });

    app.run().await?;
    info!("Exiting.");
    Ok(())
}
