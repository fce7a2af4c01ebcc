//! The main application logic, decoupled from the entry point.

use crate::{
    api::ZabbixConnector,
    config::Config,
    core::Connector,
    formatting::Renderer,
    internal_metrics::{Metrics, MetricsBuilder},
    resolver::RecipientResolver,
    web::{self, AppState},
};
use anyhow::{Context, Result};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// A bound, ready-to-serve web interface.
pub struct App {
    listener: TcpListener,
    router: Router,
    shutdown_rx: watch::Receiver<()>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the server is bound to. Useful when listening on port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves requests until the shutdown signal fires, then lets in-flight
    /// requests finish.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
                info!("Shutdown signal received, draining connections...");
            })
            .await?;
        info!("Web server stopped.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Components can be overridden for testing.
pub struct AppBuilder {
    config: Config,
    connector_override: Option<Arc<dyn Connector>>,
    metrics_override: Option<Metrics>,
    prometheus_override: Option<PrometheusHandle>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            connector_override: None,
            metrics_override: None,
            prometheus_override: None,
        }
    }

    /// Overrides the monitoring API connector for testing.
    pub fn connector_override(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector_override = Some(connector);
        self
    }

    /// Overrides the metrics handle for testing. No recorder is installed.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Serves `/metrics` from the given handle instead of a global recorder.
    pub fn prometheus_override(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_override = Some(handle);
        self
    }

    /// Wires the components together and binds the listening socket.
    pub async fn build(self, shutdown_rx: watch::Receiver<()>) -> Result<App> {
        let config = self.config;

        let (metrics, prometheus) = match self.metrics_override {
            Some(metrics) => (metrics, None),
            None => MetricsBuilder::new(config.metrics.clone()).build(),
        };
        let prometheus = self.prometheus_override.or(prometheus);

        let connector: Arc<dyn Connector> = match self.connector_override {
            Some(connector) => connector,
            None => Arc::new(
                ZabbixConnector::new(config.zabbix.clone(), metrics.clone())
                    .context("failed to set up the monitoring API client")?,
            ),
        };
        let renderer = Renderer::new().context("failed to load page templates")?;

        let state = AppState {
            connector,
            resolver: RecipientResolver::new(metrics),
            renderer: Arc::new(renderer),
            report: config.report.clone(),
            prometheus,
        };

        let listener = TcpListener::bind(config.server.listen_address)
            .await
            .with_context(|| format!("failed to bind {}", config.server.listen_address))?;
        info!(addr = %listener.local_addr()?, "Web interface listening.");

        Ok(App {
            listener,
            router: web::router(state),
            shutdown_rx,
        })
    }
}
