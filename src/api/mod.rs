//! Client side of the monitoring server's JSON-RPC API.
//!
//! The records below mirror the API's JSON objects. Identifiers and enum
//! codes stay strings, the way the API sends them; interpretation happens in
//! the resolver and its helpers.

pub mod zabbix;
#[cfg(feature = "test-utils")]
pub mod fake;

pub use zabbix::{ZabbixClient, ZabbixConnector};

use crate::core::SendTo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The single error kind returned by every monitoring API call.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("monitoring API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("monitoring API error {code}: {message} {data}")]
    Rpc {
        code: i64,
        message: String,
        data: String,
    },

    #[error("monitoring API authentication failed: {0}")]
    Auth(String),

    #[error("malformed monitoring API data: {0}")]
    Malformed(String),
}

/// Deserializes an object that the API sends as `[]` when it is absent.
fn object_or_empty<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Array(items) if items.is_empty() => Ok(None),
        other => T::deserialize(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HostRecord {
    pub hostid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hostgroups: Vec<GroupRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GroupRef {
    pub groupid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HostRef {
    pub hostid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TriggerRef {
    pub triggerid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ItemRef {
    pub itemid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserRef {
    pub userid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserGroupRef {
    pub usrgrpid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TagRecord {
    pub tag: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DiscoveryRuleRef {
    #[serde(default)]
    pub templateid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TriggerRecord {
    pub triggerid: String,
    pub description: String,
    #[serde(default)]
    pub event_name: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub templateid: String,
    #[serde(default)]
    pub hostgroups: Vec<GroupRef>,
    #[serde(default)]
    pub hosts: Vec<HostRef>,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
    #[serde(
        default,
        rename = "discoveryRule",
        deserialize_with = "object_or_empty"
    )]
    pub discovery_rule: Option<DiscoveryRuleRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TemplateRecord {
    pub templateid: String,
    #[serde(default)]
    pub triggers: Vec<TriggerRef>,
    #[serde(default)]
    pub discoveries: Vec<ItemRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConditionRecord {
    pub conditiontype: String,
    pub operator: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub value2: String,
    pub formulaid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ActionFilter {
    #[serde(default)]
    pub evaltype: String,
    #[serde(default)]
    pub eval_formula: String,
    #[serde(default)]
    pub conditions: Vec<ConditionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OpMessage {
    #[serde(default)]
    pub default_msg: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub mediatypeid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct OperationRecord {
    pub operationid: String,
    pub operationtype: String,
    #[serde(default)]
    pub esc_period: Option<String>,
    #[serde(default)]
    pub esc_step_from: Option<String>,
    #[serde(default)]
    pub esc_step_to: Option<String>,
    #[serde(default, deserialize_with = "object_or_empty")]
    pub opmessage: Option<OpMessage>,
    #[serde(default)]
    pub opmessage_usr: Vec<UserRef>,
    #[serde(default)]
    pub opmessage_grp: Vec<UserGroupRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ActionRecord {
    pub actionid: String,
    pub name: String,
    #[serde(default)]
    pub esc_period: String,
    #[serde(default, deserialize_with = "object_or_empty")]
    pub filter: Option<ActionFilter>,
    #[serde(default)]
    pub operations: Vec<OperationRecord>,
    #[serde(default)]
    pub recovery_operations: Vec<OperationRecord>,
    #[serde(default)]
    pub update_operations: Vec<OperationRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MessageTemplateRecord {
    pub eventsource: String,
    pub recovery: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MediaTypeRecord {
    pub mediatypeid: String,
    pub name: String,
    #[serde(default)]
    pub message_templates: Vec<MessageTemplateRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaRecord {
    pub mediatypeid: String,
    /// `"0"` when the medium is enabled.
    pub active: String,
    pub sendto: SendTo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RoleRef {
    #[serde(rename = "type")]
    pub role_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserRecord {
    pub userid: String,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default, deserialize_with = "object_or_empty")]
    pub role: Option<RoleRef>,
    #[serde(default)]
    pub usrgrps: Vec<UserGroupRef>,
    #[serde(default)]
    pub medias: Vec<MediaRecord>,
}

impl UserRecord {
    pub fn is_super_admin(&self) -> bool {
        self.role.as_ref().is_some_and(|r| r.role_type == "3")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HostGroupRight {
    /// Host group id.
    pub id: String,
    pub permission: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserGroupRecord {
    pub usrgrpid: String,
    #[serde(default)]
    pub users: Vec<UserRef>,
    #[serde(default)]
    pub hostgroup_rights: Vec<HostGroupRight>,
}
