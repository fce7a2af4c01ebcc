//! Expansion of action operations into the messages they send.

use crate::api::{ActionRecord, ApiError, MediaTypeRecord, OperationRecord};
use crate::core::{Message, OperationKind};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

const SEND_MESSAGE: &str = "0";
const NOTIFY_ALL_RECOVERY: &str = "11";
const NOTIFY_ALL_UPDATE: &str = "12";
/// Media type id meaning "every enabled media type".
const ALL_MEDIA_TYPES: &str = "0";
/// Event source of trigger events in message templates.
const TRIGGER_EVENTS: &str = "0";

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Builds every message `action` sends, in problem, update, recovery order.
pub fn build_messages(
    action: &ActionRecord,
    media_types: &[MediaTypeRecord],
) -> Result<Vec<Message>, ApiError> {
    let mut messages = Vec::new();
    let kinds = [
        OperationKind::Problem,
        OperationKind::Update,
        OperationKind::Recovery,
    ];

    for kind in kinds {
        for operation in expand_operations(kind, action) {
            if operation.operationtype != SEND_MESSAGE {
                continue;
            }
            let mediatypeid = operation
                .opmessage
                .as_ref()
                .map(|m| m.mediatypeid.as_str())
                .unwrap_or(ALL_MEDIA_TYPES);

            if mediatypeid == ALL_MEDIA_TYPES {
                for media_type in media_types {
                    messages.push(new_message(
                        kind,
                        action,
                        &operation,
                        &media_type.mediatypeid,
                        Some(media_type),
                    )?);
                }
            } else {
                let media_type = media_types.iter().find(|m| m.mediatypeid == mediatypeid);
                if media_type.is_none() {
                    debug!(
                        action = %action.name,
                        mediatypeid,
                        "Operation uses a media type that is not enabled."
                    );
                }
                messages.push(new_message(kind, action, &operation, mediatypeid, media_type)?);
            }
        }
    }

    Ok(messages)
}

fn operations_for(kind: OperationKind, action: &ActionRecord) -> &[OperationRecord] {
    match kind {
        OperationKind::Problem => &action.operations,
        OperationKind::Recovery => &action.recovery_operations,
        OperationKind::Update => &action.update_operations,
    }
}

/// Replaces "notify all involved" operations with one send-message operation
/// per send-message operation of the other problem/update lists.
fn expand_operations(kind: OperationKind, action: &ActionRecord) -> Vec<OperationRecord> {
    let mut expanded = Vec::new();
    for operation in operations_for(kind, action) {
        if operation.operationtype != NOTIFY_ALL_RECOVERY
            && operation.operationtype != NOTIFY_ALL_UPDATE
        {
            expanded.push(operation.clone());
            continue;
        }

        let involved = [OperationKind::Problem, OperationKind::Update]
            .into_iter()
            .filter(|other| *other != kind)
            .flat_map(|other| operations_for(other, action))
            .filter(|source| source.operationtype == SEND_MESSAGE);

        for source in involved {
            let mut notify = operation.clone();
            notify.operationtype = SEND_MESSAGE.to_string();
            notify.opmessage_usr = source.opmessage_usr.clone();
            notify.opmessage_grp = source.opmessage_grp.clone();
            let mut opmessage = notify.opmessage.take().unwrap_or_default();
            opmessage.mediatypeid = source
                .opmessage
                .as_ref()
                .map(|m| m.mediatypeid.clone())
                .unwrap_or_else(|| ALL_MEDIA_TYPES.to_string());
            notify.opmessage = Some(opmessage);
            expanded.push(notify);
        }
    }
    expanded
}

fn new_message(
    kind: OperationKind,
    action: &ActionRecord,
    operation: &OperationRecord,
    mediatypeid: &str,
    media_type: Option<&MediaTypeRecord>,
) -> Result<Message, ApiError> {
    let opmessage = operation.opmessage.clone().unwrap_or_default();
    let default_msg = opmessage.default_msg == "1";

    let esc_period = match operation.esc_period.as_deref() {
        None | Some("") | Some("0") => action.esc_period.clone(),
        Some(period) => period.to_string(),
    };
    let esc_step_from = parse_step(operation.esc_step_from.as_deref(), 1)?;
    let esc_step_to = parse_step(operation.esc_step_to.as_deref(), 0)?;

    let repeat_count = if esc_step_to != 0 {
        (i64::from(esc_step_to) - i64::from(esc_step_from) + 1).to_string()
    } else if kind != OperationKind::Problem {
        "1".to_string()
    } else {
        "∞".to_string()
    };

    let mut message = Message {
        optype: kind,
        actionid: action.actionid.clone(),
        actionname: action.name.clone(),
        operationid: operation.operationid.clone(),
        mediatypeid: mediatypeid.to_string(),
        mediatypename: String::new(),
        subject: opmessage.subject,
        message: opmessage.message,
        default_msg,
        start_delay: multiply_time(&esc_period, esc_step_from.saturating_sub(1)),
        esc_period,
        esc_step_from,
        esc_step_to,
        repeat_count,
        users: operation
            .opmessage_usr
            .iter()
            .map(|u| u.userid.clone())
            .collect(),
        groups: operation
            .opmessage_grp
            .iter()
            .map(|g| g.usrgrpid.clone())
            .collect(),
        recipients: Vec::new(),
    };

    if let Some(media_type) = media_type {
        message.mediatypename = media_type.name.clone();
        let template = media_type
            .message_templates
            .iter()
            .find(|t| t.recovery == kind.code() && t.eventsource == TRIGGER_EVENTS)
            .filter(|_| default_msg);
        if let Some(template) = template {
            message.subject = template.subject.clone();
            message.message = template.message.clone();
        }
    }

    Ok(message)
}

fn parse_step(step: Option<&str>, default: u32) -> Result<u32, ApiError> {
    match step {
        None | Some("") => Ok(default),
        Some(step) => step
            .trim()
            .parse()
            .map_err(|_| ApiError::Malformed(format!("invalid escalation step '{}'", step))),
    }
}

/// Multiplies every number in a time string, e.g. `1h` × 2 = `2h`.
///
/// A result starting with `0` collapses to `"0"`.
pub fn multiply_time(time: &str, multiplier: u32) -> String {
    let result = NUMBER.replace_all(time, |caps: &regex::Captures| {
        caps[0]
            .parse::<u64>()
            .map(|n| n.saturating_mul(u64::from(multiplier)).to_string())
            .unwrap_or_else(|_| caps[0].to_string())
    });
    if result.starts_with('0') {
        "0".to_string()
    } else {
        result.into_owned()
    }
}
