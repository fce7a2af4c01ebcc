#![allow(dead_code)]
//! Shared fixtures for the integration tests.

use alertreach::api::fake::FakeMonitoringApi;
use alertreach::api::{
    ActionFilter, ActionRecord, ConditionRecord, GroupRef, HostRef, MediaRecord,
    MediaTypeRecord, MessageTemplateRecord, OpMessage, OperationRecord, RoleRef, TriggerRecord,
    UserGroupRecord, UserGroupRef, UserRecord, UserRef,
};
use alertreach::core::{Permission, SendTo};

pub const HOST_ID: &str = "10084";
pub const HOST_GROUP: &str = "2";
pub const TRIGGER_ID: &str = "100";
pub const EMAIL: &str = "1";
pub const SMS: &str = "3";
pub const ADMINS: &str = "7";
pub const ALICE: &str = "5";
pub const BOB: &str = "6";

pub fn email_media_type() -> MediaTypeRecord {
    MediaTypeRecord {
        mediatypeid: EMAIL.into(),
        name: "Email".into(),
        message_templates: vec![
            MessageTemplateRecord {
                eventsource: "0".into(),
                recovery: "0".into(),
                subject: "Problem: {EVENT.NAME}".into(),
                message: "Problem started at {EVENT.TIME}".into(),
            },
            MessageTemplateRecord {
                eventsource: "0".into(),
                recovery: "1".into(),
                subject: "Resolved: {EVENT.NAME}".into(),
                message: "Problem has been resolved".into(),
            },
        ],
    }
}

pub fn sms_media_type() -> MediaTypeRecord {
    MediaTypeRecord {
        mediatypeid: SMS.into(),
        name: "SMS".into(),
        message_templates: vec![],
    }
}

pub fn trigger(triggerid: &str, description: &str, priority: &str) -> TriggerRecord {
    TriggerRecord {
        triggerid: triggerid.into(),
        description: description.into(),
        priority: priority.into(),
        templateid: "0".into(),
        hostgroups: vec![GroupRef {
            groupid: HOST_GROUP.into(),
        }],
        hosts: vec![HostRef {
            hostid: HOST_ID.into(),
        }],
        ..Default::default()
    }
}

/// A single-step send-message operation using the media type's default message.
pub fn send_message(
    operationid: &str,
    mediatypeid: &str,
    users: &[&str],
    groups: &[&str],
) -> OperationRecord {
    OperationRecord {
        operationid: operationid.into(),
        operationtype: "0".into(),
        esc_period: Some("0".into()),
        esc_step_from: Some("1".into()),
        esc_step_to: Some("1".into()),
        opmessage: Some(OpMessage {
            default_msg: "1".into(),
            mediatypeid: mediatypeid.into(),
            ..Default::default()
        }),
        opmessage_usr: users
            .iter()
            .map(|u| UserRef {
                userid: u.to_string(),
            })
            .collect(),
        opmessage_grp: groups
            .iter()
            .map(|g| UserGroupRef {
                usrgrpid: g.to_string(),
            })
            .collect(),
    }
}

pub fn action(actionid: &str, name: &str, operations: Vec<OperationRecord>) -> ActionRecord {
    ActionRecord {
        actionid: actionid.into(),
        name: name.into(),
        esc_period: "1h".into(),
        operations,
        ..Default::default()
    }
}

/// Restricts an action to triggers of at least `priority`.
pub fn with_min_severity(mut action: ActionRecord, priority: &str) -> ActionRecord {
    action.filter = Some(ActionFilter {
        evaltype: "0".into(),
        eval_formula: "A".into(),
        conditions: vec![ConditionRecord {
            conditiontype: "4".into(),
            operator: "5".into(),
            value: priority.into(),
            value2: String::new(),
            formulaid: "A".into(),
        }],
    });
    action
}

pub fn user(userid: &str, username: &str, name: &str) -> UserRecord {
    UserRecord {
        userid: userid.into(),
        username: username.into(),
        name: name.into(),
        role: Some(RoleRef {
            role_type: "1".into(),
        }),
        usrgrps: vec![UserGroupRef {
            usrgrpid: ADMINS.into(),
        }],
        ..Default::default()
    }
}

pub fn group(usrgrpid: &str, members: &[&str]) -> UserGroupRecord {
    UserGroupRecord {
        usrgrpid: usrgrpid.into(),
        users: members
            .iter()
            .map(|m| UserRef {
                userid: m.to_string(),
            })
            .collect(),
        hostgroup_rights: vec![],
    }
}

pub fn email(address: &str) -> MediaRecord {
    MediaRecord {
        mediatypeid: EMAIL.into(),
        active: "0".into(),
        sendto: SendTo::Multiple(vec![address.into()]),
    }
}

/// Host "Server-1" with trigger "CPU high" and action "Notify admins"
/// sending one email step to group "Admins" (alice and bob). alice has an
/// email address and read access; bob has read access but no media.
pub fn server_1() -> FakeMonitoringApi {
    FakeMonitoringApi::new()
        .with_host(HOST_ID, "Server-1", &[HOST_GROUP])
        .with_trigger(HOST_ID, trigger(TRIGGER_ID, "CPU high", "4"))
        .with_media_type(email_media_type())
        .with_media_type(sms_media_type())
        .with_action(action(
            "7",
            "Notify admins",
            vec![send_message("31", EMAIL, &[], &[ADMINS])],
        ))
        .with_user_group(group(ADMINS, &[ALICE, BOB]))
        .with_user(user(ALICE, "alice", "Alice"))
        .with_user(user(BOB, "bob", "Bob"))
        .with_media(ALICE, email("alice@example.com"))
        .with_permission(ALICE, HOST_ID, Permission::Read)
        .with_permission(BOB, HOST_ID, Permission::Read)
}
