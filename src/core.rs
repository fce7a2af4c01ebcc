//! Core domain types and service traits for alertreach
//!
//! This module defines the report structure handed to the presentation
//! layer and the trait contracts the resolver uses to reach the monitoring
//! server.

use crate::api::{
    ActionRecord, ApiError, HostRecord, MediaRecord, MediaTypeRecord, TemplateRecord,
    TriggerRecord, UserGroupRecord, UserRecord,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The root of a report: a host and every trigger bound to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Host {
    pub hostid: String,
    pub name: String,
    /// Triggers keyed by trigger id, in the order the API returned them.
    pub triggers: IndexMap<String, Trigger>,
}

/// A trigger tag. Names may repeat with different values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Tag {
    pub tag: String,
    pub value: String,
}

/// A monitoring rule whose firing can start an escalation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Trigger {
    pub triggerid: String,
    /// The trigger description as shown in the frontend.
    pub name: String,
    /// Event name, empty when the trigger does not override it.
    pub event_name: String,
    pub priority: String,
    pub hostgroups: Vec<String>,
    pub hosts: Vec<String>,
    pub tags: Vec<Tag>,
    /// Id of the template trigger this one was inherited from, or its own id.
    pub tmpl_triggerid: String,
    /// Template item id of the discovery rule that created this trigger.
    pub lld_templateid: Option<String>,
    /// Templates the trigger is linked to.
    pub templates: Vec<String>,
    pub messages: Vec<Message>,
}

impl Trigger {
    pub fn from_record(record: TriggerRecord) -> Self {
        let tmpl_triggerid = if record.templateid.is_empty() || record.templateid == "0" {
            record.triggerid.clone()
        } else {
            record.templateid
        };
        Self {
            triggerid: record.triggerid,
            name: record.description,
            event_name: record.event_name,
            priority: record.priority,
            hostgroups: record.hostgroups.into_iter().map(|g| g.groupid).collect(),
            hosts: record.hosts.into_iter().map(|h| h.hostid).collect(),
            tags: record
                .tags
                .into_iter()
                .map(|t| Tag {
                    tag: t.tag,
                    value: t.value,
                })
                .collect(),
            tmpl_triggerid,
            lld_templateid: record
                .discovery_rule
                .map(|rule| rule.templateid)
                .filter(|id| !id.is_empty() && id != "0"),
            templates: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Links the templates that own this trigger or the discovery rule it came from.
    pub fn select_templates(&mut self, templates: &[TemplateRecord]) {
        for template in templates {
            let owns_trigger = template
                .triggers
                .iter()
                .any(|t| t.triggerid == self.tmpl_triggerid);
            let owns_rule = self.lld_templateid.as_ref().is_some_and(|rule| {
                template.discoveries.iter().any(|d| &d.itemid == rule)
            });
            if (owns_trigger || owns_rule) && !self.templates.contains(&template.templateid) {
                self.templates.push(template.templateid.clone());
            }
        }
    }

    /// The name matched by event name conditions.
    pub fn event_name_or_description(&self) -> &str {
        if self.event_name.is_empty() {
            &self.name
        } else {
            &self.event_name
        }
    }
}

/// The event an operation reacts to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Problem,
    Recovery,
    Update,
}

impl OperationKind {
    /// The numeric code used by the API for message templates (`recovery` field).
    pub fn code(self) -> &'static str {
        match self {
            OperationKind::Problem => "0",
            OperationKind::Recovery => "1",
            OperationKind::Update => "2",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationKind::Problem => "problem",
            OperationKind::Recovery => "recovery",
            OperationKind::Update => "update",
        };
        f.write_str(label)
    }
}

/// One escalation step of one action, for one media type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Message {
    pub optype: OperationKind,
    pub actionid: String,
    pub actionname: String,
    pub operationid: String,
    pub mediatypeid: String,
    pub mediatypename: String,
    pub subject: String,
    pub message: String,
    pub default_msg: bool,
    /// Escalation period (repeat interval) as configured, e.g. `1h`.
    pub esc_period: String,
    pub esc_step_from: u32,
    /// Last escalation step, `0` when open ended.
    pub esc_step_to: u32,
    /// Time from the event to the first step, e.g. `2h`.
    pub start_delay: String,
    /// Display-only repeat count, `∞` for open-ended escalations.
    pub repeat_count: String,
    /// Users targeted directly by the operation.
    pub users: Vec<String>,
    /// User groups targeted by the operation.
    pub groups: Vec<String>,
    pub recipients: Vec<Recipient>,
}

impl Message {
    /// Recipients that will actually receive this message.
    pub fn eligible_recipients(&self) -> impl Iterator<Item = &Recipient> {
        self.recipients
            .iter()
            .filter(|r| r.is_eligible_for(&self.mediatypeid))
    }
}

/// Send-to address(es) of a user medium. Email media carry a list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SendTo {
    Single(String),
    Multiple(Vec<String>),
}

impl SendTo {
    pub fn addresses(&self) -> Vec<&str> {
        match self {
            SendTo::Single(address) => vec![address.as_str()],
            SendTo::Multiple(addresses) => addresses.iter().map(String::as_str).collect(),
        }
    }

    /// Merges another medium of the same type into this one.
    pub fn merge(self, other: SendTo) -> SendTo {
        let mut merged: Vec<String> = match self {
            SendTo::Single(address) => vec![address],
            SendTo::Multiple(addresses) => addresses,
        };
        match other {
            SendTo::Single(address) => merged.push(address),
            SendTo::Multiple(addresses) => merged.extend(addresses),
        }
        SendTo::Multiple(merged)
    }
}

/// A user who may receive a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Recipient {
    pub userid: String,
    pub username: String,
    pub fullname: Option<String>,
    /// Active media keyed by media type id. Disabled media are absent.
    pub sendto: BTreeMap<String, SendTo>,
    pub has_right: bool,
    pub show: bool,
}

impl Recipient {
    /// Builds a recipient from a resolved user, its media and host permission.
    pub fn new(user: &UserRecord, media: &[MediaRecord], permission: Permission) -> Self {
        let fullname = format!("{} {}", user.name, user.surname).trim().to_string();
        Self {
            userid: user.userid.clone(),
            username: user.username.clone(),
            fullname: (!fullname.is_empty()).then_some(fullname),
            sendto: media_mapping(media),
            has_right: permission.grants_read(),
            show: true,
        }
    }

    /// A placeholder for a user id whose record could not be resolved.
    pub fn unresolved(userid: &str) -> Self {
        Self {
            userid: userid.to_string(),
            username: userid.to_string(),
            ..Default::default()
        }
    }

    /// The configured address(es) for a media type, if any.
    pub fn send_to(&self, mediatypeid: &str) -> Option<&SendTo> {
        self.sendto.get(mediatypeid)
    }

    pub fn is_eligible_for(&self, mediatypeid: &str) -> bool {
        self.has_right && self.send_to(mediatypeid).is_some()
    }
}

/// Builds the media type → address mapping from active media only.
pub fn media_mapping(media: &[MediaRecord]) -> BTreeMap<String, SendTo> {
    let mut mapping: BTreeMap<String, SendTo> = BTreeMap::new();
    for medium in media.iter().filter(|m| m.active == "0") {
        let merged = match mapping.remove(&medium.mediatypeid) {
            Some(existing) => existing.merge(medium.sendto.clone()),
            None => medium.sendto.clone(),
        };
        mapping.insert(medium.mediatypeid.clone(), merged);
    }
    mapping
}

/// Effective access level of a user on a host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Deny,
    #[default]
    None,
    Read,
    ReadWrite,
}

impl Permission {
    pub fn grants_read(self) -> bool {
        matches!(self, Permission::Read | Permission::ReadWrite)
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Read-only access to the monitoring server.
///
/// Every method fails with the single `ApiError` type on transport,
/// authentication or decoding failures.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    /// Lists the hosts a report can be requested for.
    async fn get_hosts(&self) -> Result<Vec<HostRecord>, ApiError>;

    /// Looks up a single host, `None` when it does not exist.
    async fn get_host(&self, host_id: &str) -> Result<Option<HostRecord>, ApiError>;

    async fn get_triggers(&self, host_id: &str) -> Result<Vec<TriggerRecord>, ApiError>;

    /// Templates owning the given (template) triggers.
    async fn get_templates(&self, trigger_ids: &[String]) -> Result<Vec<TemplateRecord>, ApiError>;

    /// Enabled trigger actions. Selection against triggers happens locally, so
    /// implementations return actions without trigger conditions as well.
    async fn get_actions(&self, trigger_ids: &[String]) -> Result<Vec<ActionRecord>, ApiError>;

    /// Enabled media types with their message templates.
    async fn get_media_types(&self) -> Result<Vec<MediaTypeRecord>, ApiError>;

    /// User groups with their member user ids.
    async fn get_user_groups(&self, group_ids: &[String]) -> Result<Vec<UserGroupRecord>, ApiError>;

    /// Enabled users among `user_ids`. Unknown or disabled users are omitted.
    async fn get_users(&self, user_ids: &[String]) -> Result<Vec<UserRecord>, ApiError>;

    /// Media configured for a user, active or not.
    async fn get_media(&self, user_id: &str) -> Result<Vec<MediaRecord>, ApiError>;

    /// The user's effective permission on a host.
    async fn get_permission(&self, user_id: &str, host_id: &str) -> Result<Permission, ApiError>;

    /// Ends the session, if the implementation holds one.
    async fn logout(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Opens API sessions, one per incoming request.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn MonitoringApi>, ApiError>;
}
