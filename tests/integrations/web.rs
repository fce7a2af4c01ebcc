#[path = "../helpers/mod.rs"]
mod helpers;

use alertreach::api::fake::{FakeConnector, FakeMonitoringApi};
use alertreach::app::App;
use alertreach::config::Config;
use alertreach::core::{Host, Permission};
use alertreach::internal_metrics::Metrics;
use helpers::*;
use metrics_exporter_prometheus::PrometheusBuilder;
use reqwest::{redirect::Policy, StatusCode};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

struct TestServer {
    addr: SocketAddr,
    client: reqwest::Client,
    shutdown_tx: watch::Sender<()>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(connector: FakeConnector, configure: impl FnOnce(&mut Config)) -> Self {
        let mut config = Config::default();
        config.server.listen_address = "127.0.0.1:0".parse().unwrap();
        configure(&mut config);

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let app = App::builder(config)
            .connector_override(Arc::new(connector))
            .metrics_override(Metrics::new())
            .prometheus_override(PrometheusBuilder::new().build_recorder().handle())
            .build(shutdown_rx)
            .await
            .unwrap();
        let addr = app.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            app.run().await.unwrap();
        });

        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()
            .unwrap();
        Self {
            addr,
            client,
            shutdown_tx,
            handle,
        }
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("http://{}{}", self.addr, path))
            .send()
            .await
            .unwrap()
    }

    async fn stop(self) {
        self.shutdown_tx.send(()).unwrap();
        self.handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_index_lists_hosts() {
    let server = TestServer::start(FakeConnector::new(server_1()), |_| {}).await;

    let response = server.get("/").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("href=\"/report/10084\""));
    assert!(body.contains("Server-1"));

    server.stop().await;
}

#[tokio::test]
async fn test_index_redirects_to_report() {
    let server = TestServer::start(FakeConnector::new(server_1()), |_| {}).await;

    let response = server.get("/?hostid=10084").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        "/report/10084"
    );

    server.stop().await;
}

#[tokio::test]
async fn test_report_page_renders_recipients() {
    let api = server_1();
    let server = TestServer::start(FakeConnector::new(api.clone()), |_| {}).await;

    let response = server.get("/report/10084").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("CPU high"));
    assert!(body.contains("alice@example.com"));
    assert!(body.contains("<td>bob</td>"));
    assert!(body.contains("<td>-</td>"));
    assert!(api.logged_out());

    server.stop().await;
}

#[tokio::test]
async fn test_unavailable_recipients_are_hidden_by_default() {
    let api = server_1().with_permission(BOB, HOST_ID, Permission::None);
    let server = TestServer::start(FakeConnector::new(api), |_| {}).await;

    let body = server.get("/report/10084").await.text().await.unwrap();
    assert!(body.contains("<td>alice</td>"));
    assert!(!body.contains("<td>bob</td>"));

    server.stop().await;
}

#[tokio::test]
async fn test_unavailable_recipients_shown_when_enabled() {
    let api = server_1().with_permission(BOB, HOST_ID, Permission::None);
    let server = TestServer::start(FakeConnector::new(api), |config| {
        config.report.show_unavailable = true;
    })
    .await;

    let body = server.get("/report/10084").await.text().await.unwrap();
    assert!(body.contains("<td>alice</td>"));
    assert!(body.contains("<td>bob</td>"));

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_host_page_is_not_found() {
    let server = TestServer::start(FakeConnector::new(server_1()), |_| {}).await;

    let response = server.get("/report/999").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response.text().await.unwrap();
    assert!(body.contains("Host with ID 999 was not found"));

    let response = server.get("/report/not-a-number").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn test_json_report() {
    let server = TestServer::start(FakeConnector::new(server_1()), |_| {}).await;

    let response = server.get("/api/report/10084").await;
    assert_eq!(response.status(), StatusCode::OK);
    let host: Host = response.json().await.unwrap();
    let message = &host.triggers[TRIGGER_ID].messages[0];
    assert_eq!(message.recipients.len(), 2);
    assert_eq!(message.eligible_recipients().count(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_json_hosts() {
    let server = TestServer::start(FakeConnector::new(server_1()), |_| {}).await;

    let hosts: Value = server.get("/api/hosts").await.json().await.unwrap();
    assert_eq!(
        hosts,
        serde_json::json!([{ "hostid": "10084", "name": "Server-1" }])
    );

    server.stop().await;
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let api = server_1().failing("get_actions");
    let server = TestServer::start(FakeConnector::new(api.clone()), |_| {}).await;

    let response = server.get("/api/report/10084").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("get_actions"));

    let response = server.get("/report/10084").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    // The session is closed even when resolution fails.
    assert!(api.logged_out());

    server.stop().await;
}

#[tokio::test]
async fn test_rejected_login_is_bad_gateway() {
    let server = TestServer::start(FakeConnector::rejecting_login(), |_| {}).await;

    let response = server.get("/api/hosts").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("authentication failed"));

    let response = server.get("/").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    server.stop().await;
}

#[tokio::test]
async fn test_healthz_and_metrics() {
    let server = TestServer::start(FakeConnector::new(FakeMonitoringApi::new()), |_| {}).await;

    let response = server.get("/healthz").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "ok");

    let response = server.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    server.stop().await;
}
