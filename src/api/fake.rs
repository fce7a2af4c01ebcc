//! An in-memory monitoring API for tests.

use super::{
    ActionRecord, ApiError, HostRecord, MediaRecord, MediaTypeRecord, TemplateRecord,
    TriggerRecord, UserGroupRecord, UserRecord,
};
use crate::core::{Connector, MonitoringApi, Permission};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct State {
    hosts: Vec<HostRecord>,
    triggers: HashMap<String, Vec<TriggerRecord>>,
    templates: Vec<TemplateRecord>,
    actions: Vec<ActionRecord>,
    media_types: Vec<MediaTypeRecord>,
    user_groups: Vec<UserGroupRecord>,
    users: Vec<UserRecord>,
    media: HashMap<String, Vec<MediaRecord>>,
    permissions: HashMap<(String, String), Permission>,
    failing: HashSet<String>,
    calls: Vec<String>,
    logged_out: bool,
}

/// A `MonitoringApi` answering from records registered up front.
///
/// Clones share state, so a test can keep a handle to inspect the calls
/// made through a connector.
#[derive(Debug, Clone, Default)]
pub struct FakeMonitoringApi {
    state: Arc<Mutex<State>>,
}

impl FakeMonitoringApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(self, f: impl FnOnce(&mut State)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn with_host(self, hostid: &str, name: &str, hostgroups: &[&str]) -> Self {
        let host = HostRecord {
            hostid: hostid.to_string(),
            name: name.to_string(),
            hostgroups: hostgroups
                .iter()
                .map(|g| super::GroupRef {
                    groupid: g.to_string(),
                })
                .collect(),
        };
        self.update(|s| s.hosts.push(host))
    }

    pub fn with_trigger(self, hostid: &str, trigger: TriggerRecord) -> Self {
        self.update(|s| {
            s.triggers
                .entry(hostid.to_string())
                .or_default()
                .push(trigger)
        })
    }

    pub fn with_template(self, template: TemplateRecord) -> Self {
        self.update(|s| s.templates.push(template))
    }

    pub fn with_action(self, action: ActionRecord) -> Self {
        self.update(|s| s.actions.push(action))
    }

    pub fn with_media_type(self, media_type: MediaTypeRecord) -> Self {
        self.update(|s| s.media_types.push(media_type))
    }

    pub fn with_user_group(self, group: UserGroupRecord) -> Self {
        self.update(|s| s.user_groups.push(group))
    }

    pub fn with_user(self, user: UserRecord) -> Self {
        self.update(|s| s.users.push(user))
    }

    pub fn with_media(self, userid: &str, medium: MediaRecord) -> Self {
        self.update(|s| s.media.entry(userid.to_string()).or_default().push(medium))
    }

    pub fn with_permission(self, userid: &str, hostid: &str, permission: Permission) -> Self {
        self.update(|s| {
            s.permissions
                .insert((userid.to_string(), hostid.to_string()), permission);
        })
    }

    /// Makes every call of `method` (e.g. `"get_actions"`) fail.
    pub fn failing(self, method: &str) -> Self {
        self.update(|s| {
            s.failing.insert(method.to_string());
        })
    }

    /// Names of the methods called so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == method)
            .count()
    }

    pub fn logged_out(&self) -> bool {
        self.state.lock().unwrap().logged_out
    }

    /// Records the call and returns the configured failure, if any.
    fn enter(&self, method: &str) -> Result<std::sync::MutexGuard<'_, State>, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(method.to_string());
        if state.failing.contains(method) {
            return Err(ApiError::Rpc {
                code: -32500,
                message: "Application error.".to_string(),
                data: format!("simulated failure of {}", method),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl MonitoringApi for FakeMonitoringApi {
    async fn get_hosts(&self) -> Result<Vec<HostRecord>, ApiError> {
        Ok(self.enter("get_hosts")?.hosts.clone())
    }

    async fn get_host(&self, host_id: &str) -> Result<Option<HostRecord>, ApiError> {
        let state = self.enter("get_host")?;
        Ok(state.hosts.iter().find(|h| h.hostid == host_id).cloned())
    }

    async fn get_triggers(&self, host_id: &str) -> Result<Vec<TriggerRecord>, ApiError> {
        let state = self.enter("get_triggers")?;
        Ok(state.triggers.get(host_id).cloned().unwrap_or_default())
    }

    async fn get_templates(&self, trigger_ids: &[String]) -> Result<Vec<TemplateRecord>, ApiError> {
        let state = self.enter("get_templates")?;
        Ok(state
            .templates
            .iter()
            .filter(|t| t.triggers.iter().any(|r| trigger_ids.contains(&r.triggerid)))
            .cloned()
            .collect())
    }

    async fn get_actions(&self, _trigger_ids: &[String]) -> Result<Vec<ActionRecord>, ApiError> {
        Ok(self.enter("get_actions")?.actions.clone())
    }

    async fn get_media_types(&self) -> Result<Vec<MediaTypeRecord>, ApiError> {
        Ok(self.enter("get_media_types")?.media_types.clone())
    }

    async fn get_user_groups(&self, group_ids: &[String]) -> Result<Vec<UserGroupRecord>, ApiError> {
        let state = self.enter("get_user_groups")?;
        Ok(state
            .user_groups
            .iter()
            .filter(|g| group_ids.contains(&g.usrgrpid))
            .cloned()
            .collect())
    }

    async fn get_users(&self, user_ids: &[String]) -> Result<Vec<UserRecord>, ApiError> {
        let state = self.enter("get_users")?;
        Ok(state
            .users
            .iter()
            .filter(|u| user_ids.contains(&u.userid))
            .cloned()
            .collect())
    }

    async fn get_media(&self, user_id: &str) -> Result<Vec<MediaRecord>, ApiError> {
        let state = self.enter("get_media")?;
        Ok(state.media.get(user_id).cloned().unwrap_or_default())
    }

    async fn get_permission(&self, user_id: &str, host_id: &str) -> Result<Permission, ApiError> {
        let state = self.enter("get_permission")?;
        Ok(state
            .permissions
            .get(&(user_id.to_string(), host_id.to_string()))
            .copied()
            .unwrap_or_default())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let mut state = self.enter("logout")?;
        state.logged_out = true;
        Ok(())
    }
}

/// A `Connector` handing out a shared `FakeMonitoringApi`.
#[derive(Debug, Clone)]
pub struct FakeConnector {
    api: FakeMonitoringApi,
    reject_login: bool,
}

impl FakeConnector {
    pub fn new(api: FakeMonitoringApi) -> Self {
        Self {
            api,
            reject_login: false,
        }
    }

    /// A connector whose every session fails to authenticate.
    pub fn rejecting_login() -> Self {
        Self {
            api: FakeMonitoringApi::new(),
            reject_login: true,
        }
    }

    pub fn api(&self) -> &FakeMonitoringApi {
        &self.api
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn MonitoringApi>, ApiError> {
        if self.reject_login {
            return Err(ApiError::Auth(
                "Incorrect user name or password or account is temporarily blocked.".to_string(),
            ));
        }
        Ok(Arc::new(self.api.clone()))
    }
}
