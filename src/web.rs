//! The HTTP surface: HTML pages, their JSON mirrors and operational endpoints.

use crate::api::{ApiError, HostRecord};
use crate::config::ReportConfig;
use crate::core::{Connector, Host, MonitoringApi};
use crate::formatting::Renderer;
use crate::resolver::{RecipientResolver, ResolveError};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Shared, immutable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub connector: Arc<dyn Connector>,
    pub resolver: RecipientResolver,
    pub renderer: Arc<Renderer>,
    pub report: ReportConfig,
    pub prometheus: Option<PrometheusHandle>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] ApiError),

    #[error("failed to render page: {0}")]
    Render(#[from] tera::Error),
}

impl From<ResolveError> for AppError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Lookup(msg) => AppError::NotFound(msg),
            ResolveError::Upstream(e) => AppError::Upstream(e),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    hostid: Option<String>,
}

/// A selectable host.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HostSummary {
    pub hostid: String,
    pub name: String,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(index))
        .route("/report/{hostid}", get(report_page))
        .route("/api/hosts", get(api_hosts))
        .route("/api/report/{hostid}", get(api_report))
        .route("/healthz", get(|| async { "ok" }));
    if state.prometheus.is_some() {
        router = router.route("/metrics", get(metrics));
    }
    router.with_state(state)
}

/// Runs `f` inside one API session, logging out afterwards whatever the outcome.
async fn with_session<T, F, Fut>(connector: &dyn Connector, f: F) -> Result<T, AppError>
where
    F: FnOnce(Arc<dyn MonitoringApi>) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let api = connector.connect().await?;
    let result = f(api.clone()).await;
    if let Err(e) = api.logout().await {
        warn!(error = %e, "Failed to log out of the monitoring API.");
    }
    result
}

async fn list_hosts(state: &AppState) -> Result<Vec<HostRecord>, AppError> {
    with_session(state.connector.as_ref(), |api| async move {
        Ok::<_, AppError>(api.get_hosts().await?)
    })
    .await
}

async fn resolve_report(state: &AppState, hostid: &str) -> Result<Host, AppError> {
    if hostid.is_empty() || !hostid.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::NotFound(format!("Host with ID {} was not found", hostid)));
    }
    let resolver = &state.resolver;
    with_session(state.connector.as_ref(), |api| async move {
        Ok::<_, AppError>(resolver.resolve(api.as_ref(), hostid).await?)
    })
    .await
}

/// Renders the index page with an error message, falling back to plain text
/// when even that fails.
fn error_page(state: &AppState, hostid: &str, err: AppError) -> Response {
    let status = err.status();
    let message = err.to_string();
    match state.renderer.render_index(&[], hostid, Some(&message)) {
        Ok(page) => (status, Html(page)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render error page.");
            (status, message).into_response()
        }
    }
}

async fn index(State(state): State<AppState>, Query(query): Query<IndexQuery>) -> Response {
    if let Some(hostid) = query.hostid.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
        if !hostid.chars().all(|c| c.is_ascii_digit()) {
            let err = AppError::NotFound(format!("Host with ID {} was not found", hostid));
            return error_page(&state, hostid, err);
        }
        let location = format!("/report/{}", hostid);
        debug!(location = %location, "Redirecting to host report.");
        return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    }

    let hosts = match list_hosts(&state).await {
        Ok(hosts) => hosts,
        Err(e) => return error_page(&state, "", e),
    };
    match state.renderer.render_index(&hosts, "", None) {
        Ok(page) => Html(page).into_response(),
        Err(e) => error_page(&state, "", e.into()),
    }
}

async fn report_page(State(state): State<AppState>, Path(hostid): Path<String>) -> Response {
    let host = match resolve_report(&state, &hostid).await {
        Ok(host) => host,
        Err(e) => return error_page(&state, &hostid, e),
    };
    match state
        .renderer
        .render_report(&host, state.report.show_unavailable)
    {
        Ok(page) => Html(page).into_response(),
        Err(e) => error_page(&state, &hostid, e.into()),
    }
}

async fn api_hosts(State(state): State<AppState>) -> Result<Json<Vec<HostSummary>>, AppError> {
    let hosts = list_hosts(&state).await?;
    Ok(Json(
        hosts
            .into_iter()
            .map(|h| HostSummary {
                hostid: h.hostid,
                name: h.name,
            })
            .collect(),
    ))
}

async fn api_report(
    State(state): State<AppState>,
    Path(hostid): Path<String>,
) -> Result<Json<Host>, AppError> {
    Ok(Json(resolve_report(&state, &hostid).await?))
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
