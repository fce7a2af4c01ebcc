//! JSON-RPC client for the Zabbix API.

use super::{
    ActionRecord, ApiError, HostRecord, MediaRecord, MediaTypeRecord, TemplateRecord,
    TriggerRecord, UserGroupRecord, UserRecord,
};
use crate::config::ZabbixConfig;
use crate::core::{Connector, MonitoringApi, Permission};
use crate::internal_metrics::Metrics;
use crate::permissions::host_permission;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const API_PATH: &str = "api_jsonrpc.php";

/// Turns a configured server address into the API endpoint URL.
///
/// `zbx.example.com` becomes `http://zbx.example.com/api_jsonrpc.php`.
pub fn normalize_url(url: &str) -> String {
    let mut url = url.trim().trim_end_matches('/').to_string();
    if !url.contains("://") {
        url = format!("http://{}", url);
    }
    if !url.ends_with(API_PATH) {
        url = format!("{}/{}", url, API_PATH);
    }
    url
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: String,
}

/// One authenticated API session.
pub struct ZabbixClient {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
    /// Set when the token came from `user.login` and must be released.
    logged_in: bool,
    next_id: AtomicU64,
    /// Host group ids per host id, fetched at most once per session.
    host_groups: Mutex<HashMap<String, Vec<String>>>,
    metrics: Metrics,
}

impl ZabbixClient {
    fn new(http: reqwest::Client, url: String, token: Option<String>, metrics: Metrics) -> Self {
        Self {
            http,
            url,
            token,
            logged_in: false,
            next_id: AtomicU64::new(1),
            host_groups: Mutex::new(HashMap::new()),
            metrics,
        }
    }

    /// A session authenticated with a pre-issued API token.
    pub fn with_token(http: reqwest::Client, url: String, token: String, metrics: Metrics) -> Self {
        Self::new(http, url, Some(token), metrics)
    }

    /// Opens a session with `user.login`.
    #[instrument(skip(http, password, metrics))]
    pub async fn login(
        http: reqwest::Client,
        url: String,
        username: &str,
        password: &str,
        metrics: Metrics,
    ) -> Result<Self, ApiError> {
        let mut client = Self::new(http, url, None, metrics);
        let token: String = client
            .call(
                "user.login",
                json!({ "username": username, "password": password }),
            )
            .await
            .map_err(|e| match e {
                ApiError::Rpc { message, data, .. } => {
                    ApiError::Auth(format!("{} {}", message, data).trim().to_string())
                }
                other => other,
            })?;
        debug!("Logged in to the monitoring API.");
        client.token = Some(token);
        client.logged_in = true;
        Ok(client)
    }

    /// Issues a JSON-RPC request and decodes its `result`.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ApiError> {
        let result = self.request(method, params).await;
        let outcome = match &result {
            Ok(_) => "ok",
            Err(ApiError::Transport(_)) => "transport_error",
            Err(ApiError::Rpc { .. }) | Err(ApiError::Auth(_)) => "rpc_error",
            Err(ApiError::Malformed(_)) => "malformed",
        };
        self.metrics.increment_api_request(method, outcome);
        result
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ApiError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        let envelope: RpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
            ApiError::Malformed(format!("{} returned an undecodable body: {}", method, e))
        })?;
        if let Some(error) = envelope.error {
            warn!(method, code = error.code, message = %error.message, "Monitoring API returned an error.");
            return Err(ApiError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        let result = envelope
            .result
            .ok_or_else(|| ApiError::Malformed(format!("{} returned neither result nor error", method)))?;
        serde_json::from_value(result)
            .map_err(|e| ApiError::Malformed(format!("{} returned unexpected data: {}", method, e)))
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, ApiError> {
        let users: Vec<UserRecord> = self
            .call(
                "user.get",
                json!({
                    "userids": [user_id],
                    "selectRole": ["roleid", "type"],
                    "selectUsrgrps": ["usrgrpid"],
                    "output": ["userid", "username", "name", "surname"],
                }),
            )
            .await?;
        Ok(users.into_iter().next())
    }

    async fn fetch_host(&self, host_id: &str) -> Result<Option<HostRecord>, ApiError> {
        let hosts: Vec<HostRecord> = self
            .call(
                "host.get",
                json!({
                    "hostids": [host_id],
                    "selectHostGroups": ["groupid"],
                    "output": ["hostid", "name"],
                }),
            )
            .await?;
        Ok(hosts.into_iter().next())
    }

    /// The host's group ids, shared by every permission check in the session.
    async fn host_group_ids(&self, host_id: &str) -> Result<Vec<String>, ApiError> {
        // The lock is held across the fetch so concurrent checks wait for one request.
        let mut cache = self.host_groups.lock().await;
        if let Some(groups) = cache.get(host_id) {
            return Ok(groups.clone());
        }
        let groups = self
            .fetch_host(host_id)
            .await?
            .map(|host| group_ids_of(&host))
            .unwrap_or_default();
        cache.insert(host_id.to_string(), groups.clone());
        Ok(groups)
    }
}

fn group_ids_of(host: &HostRecord) -> Vec<String> {
    host.hostgroups.iter().map(|g| g.groupid.clone()).collect()
}

#[async_trait]
impl MonitoringApi for ZabbixClient {
    async fn get_hosts(&self) -> Result<Vec<HostRecord>, ApiError> {
        self.call(
            "host.get",
            json!({ "output": ["hostid", "name"], "sortfield": "name" }),
        )
        .await
    }

    async fn get_host(&self, host_id: &str) -> Result<Option<HostRecord>, ApiError> {
        let host = self.fetch_host(host_id).await?;
        if let Some(host) = &host {
            self.host_groups
                .lock()
                .await
                .insert(host_id.to_string(), group_ids_of(host));
        }
        Ok(host)
    }

    async fn get_triggers(&self, host_id: &str) -> Result<Vec<TriggerRecord>, ApiError> {
        self.call(
            "trigger.get",
            json!({
                "hostids": [host_id],
                "selectTags": "extend",
                "selectHosts": ["hostid"],
                "selectHostGroups": ["groupid"],
                "selectDiscoveryRule": ["templateid"],
                "output": "extend",
            }),
        )
        .await
    }

    async fn get_templates(&self, trigger_ids: &[String]) -> Result<Vec<TemplateRecord>, ApiError> {
        if trigger_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.call(
            "template.get",
            json!({
                "triggerids": trigger_ids,
                "selectTriggers": ["triggerid"],
                "selectDiscoveries": ["itemid"],
                "output": ["templateid"],
            }),
        )
        .await
    }

    async fn get_actions(&self, trigger_ids: &[String]) -> Result<Vec<ActionRecord>, ApiError> {
        debug!(triggers = trigger_ids.len(), "Fetching enabled trigger actions.");
        self.call(
            "action.get",
            json!({
                "selectFilter": "extend",
                "selectOperations": "extend",
                "selectRecoveryOperations": "extend",
                "selectUpdateOperations": "extend",
                "filter": { "eventsource": 0, "status": 0 },
                "output": ["actionid", "esc_period", "eval_formula", "name"],
            }),
        )
        .await
    }

    async fn get_media_types(&self) -> Result<Vec<MediaTypeRecord>, ApiError> {
        self.call(
            "mediatype.get",
            json!({
                "selectMessageTemplates": "extend",
                "filter": { "status": 0 },
                "output": ["mediatypeid", "name"],
            }),
        )
        .await
    }

    async fn get_user_groups(&self, group_ids: &[String]) -> Result<Vec<UserGroupRecord>, ApiError> {
        if group_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.call(
            "usergroup.get",
            json!({
                "usrgrpids": group_ids,
                "selectUsers": ["userid"],
                "selectHostGroupRights": "extend",
                "output": ["usrgrpid"],
            }),
        )
        .await
    }

    async fn get_users(&self, user_ids: &[String]) -> Result<Vec<UserRecord>, ApiError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.call(
            "user.get",
            json!({
                "userids": user_ids,
                "selectUsrgrps": ["usrgrpid"],
                "selectRole": ["roleid", "type"],
                "filter": { "status": 0 },
                "output": ["userid", "username", "name", "surname"],
            }),
        )
        .await
    }

    async fn get_media(&self, user_id: &str) -> Result<Vec<MediaRecord>, ApiError> {
        let users: Vec<UserRecord> = self
            .call(
                "user.get",
                json!({
                    "userids": [user_id],
                    "selectMedias": ["mediatypeid", "active", "sendto"],
                    "output": ["userid", "username"],
                }),
            )
            .await?;
        Ok(users
            .into_iter()
            .next()
            .map(|user| user.medias)
            .unwrap_or_default())
    }

    async fn get_permission(&self, user_id: &str, host_id: &str) -> Result<Permission, ApiError> {
        let Some(user) = self.get_user(user_id).await? else {
            return Ok(Permission::None);
        };
        if user.is_super_admin() {
            return Ok(Permission::ReadWrite);
        }

        let group_ids: Vec<String> = user.usrgrps.iter().map(|g| g.usrgrpid.clone()).collect();
        let (groups, host_groups) = tokio::try_join!(
            self.get_user_groups(&group_ids),
            self.host_group_ids(host_id)
        )?;
        Ok(host_permission(&user, &groups, &host_groups))
    }

    async fn logout(&self) -> Result<(), ApiError> {
        if !self.logged_in {
            return Ok(());
        }
        let _: Value = self.call("user.logout", json!([])).await?;
        debug!("Logged out of the monitoring API.");
        Ok(())
    }
}

/// Opens `ZabbixClient` sessions from configuration.
pub struct ZabbixConnector {
    config: ZabbixConfig,
    http: reqwest::Client,
    url: String,
    metrics: Metrics,
}

impl ZabbixConnector {
    pub fn new(config: ZabbixConfig, metrics: Metrics) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .danger_accept_invalid_certs(!config.validate_certs)
            .build()?;
        let url = normalize_url(&config.url);
        info!(url = %url, token_auth = config.api_token.is_some(), "Configured monitoring API endpoint.");
        Ok(Self {
            config,
            http,
            url,
            metrics,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for ZabbixConnector {
    async fn connect(&self) -> Result<Arc<dyn MonitoringApi>, ApiError> {
        let client = match &self.config.api_token {
            Some(token) => ZabbixClient::with_token(
                self.http.clone(),
                self.url.clone(),
                token.clone(),
                self.metrics.clone(),
            ),
            None => {
                ZabbixClient::login(
                    self.http.clone(),
                    self.url.clone(),
                    &self.config.username,
                    &self.config.password,
                    self.metrics.clone(),
                )
                .await?
            }
        };
        Ok(Arc::new(client))
    }
}
