//! Selection of the actions whose filter conditions match a trigger.
//!
//! Conditions that depend on the moment an event happens (time period,
//! suppression) cannot be judged offline and are treated as satisfied, as
//! are condition types this module does not know about.

pub mod formula;

use crate::api::{ActionRecord, ApiError, ConditionRecord};
use crate::core::{Tag, Trigger};
use std::collections::HashMap;
use tracing::debug;

// Condition type codes.
const HOST_GROUP: &str = "0";
const HOST: &str = "1";
const TRIGGER: &str = "2";
const EVENT_NAME: &str = "3";
const SEVERITY: &str = "4";
const TIME_PERIOD: &str = "6";
const TEMPLATE: &str = "13";
const SUPPRESSED: &str = "16";
const TAG_NAME: &str = "25";
const TAG_VALUE: &str = "26";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterOrEqual,
    LessOrEqual,
    Unsupported,
}

impl Operator {
    fn from_code(code: &str) -> Self {
        match code {
            "0" => Operator::Equals,
            "1" => Operator::NotEquals,
            "2" => Operator::Contains,
            "3" => Operator::NotContains,
            "5" => Operator::GreaterOrEqual,
            "6" => Operator::LessOrEqual,
            _ => Operator::Unsupported,
        }
    }
}

/// Returns the actions that would fire for `trigger`, in their original order.
pub fn select_actions<'a>(
    trigger: &Trigger,
    actions: &'a [ActionRecord],
) -> Result<Vec<&'a ActionRecord>, ApiError> {
    let mut selected = Vec::new();
    for action in actions {
        if action_matches(trigger, action)? {
            selected.push(action);
        }
    }
    Ok(selected)
}

/// Checks an action's filter against a trigger.
pub fn action_matches(trigger: &Trigger, action: &ActionRecord) -> Result<bool, ApiError> {
    let filter = match &action.filter {
        Some(filter) if !filter.conditions.is_empty() => filter,
        _ => return Ok(true),
    };

    let mut results = HashMap::with_capacity(filter.conditions.len());
    for condition in &filter.conditions {
        results.insert(
            condition.formulaid.clone(),
            eval_condition(trigger, condition)?,
        );
    }

    if filter.eval_formula.trim().is_empty() {
        debug!(
            action = %action.name,
            "Action filter has no formula, requiring all conditions."
        );
        return Ok(results.values().all(|r| *r));
    }

    formula::evaluate(&filter.eval_formula, &results).map_err(|e| {
        ApiError::Malformed(format!("action '{}' ({}): {}", action.name, action.actionid, e))
    })
}

/// Evaluates a single filter condition against a trigger.
pub fn eval_condition(trigger: &Trigger, condition: &ConditionRecord) -> Result<bool, ApiError> {
    let op = Operator::from_code(&condition.operator);
    let value = condition.value.as_str();

    let result = match condition.conditiontype.as_str() {
        HOST_GROUP => membership(op, &trigger.hostgroups, value),
        HOST => membership(op, &trigger.hosts, value),
        TRIGGER => membership(op, std::slice::from_ref(&trigger.triggerid), value),
        EVENT_NAME => text(op, trigger.event_name_or_description(), value),
        SEVERITY => severity(op, &trigger.priority, value)?,
        TEMPLATE => membership(op, &trigger.templates, value),
        TAG_NAME => tag_name(op, &trigger.tags, value),
        TAG_VALUE => tag_value(op, &trigger.tags, &condition.value2, value),
        TIME_PERIOD | SUPPRESSED => true,
        other => {
            debug!(
                conditiontype = other,
                "Unknown condition type treated as satisfied."
            );
            true
        }
    };
    Ok(result)
}

fn membership(op: Operator, ids: &[String], value: &str) -> bool {
    let found = ids.iter().any(|id| id == value);
    match op {
        Operator::Equals | Operator::Contains => found,
        Operator::NotEquals | Operator::NotContains => !found,
        _ => false,
    }
}

fn text(op: Operator, data: &str, value: &str) -> bool {
    match op {
        Operator::Equals => data == value,
        Operator::NotEquals => data != value,
        Operator::Contains => data.contains(value),
        Operator::NotContains => !data.contains(value),
        _ => false,
    }
}

fn severity(op: Operator, priority: &str, value: &str) -> Result<bool, ApiError> {
    let parse = |s: &str| {
        s.trim().parse::<i64>().map_err(|_| {
            ApiError::Malformed(format!(
                "severity condition compares non-numeric values '{}' and '{}'",
                value, priority
            ))
        })
    };
    let result = match op {
        Operator::Equals => parse(priority)? == parse(value)?,
        Operator::NotEquals => parse(priority)? != parse(value)?,
        Operator::GreaterOrEqual => parse(priority)? >= parse(value)?,
        Operator::LessOrEqual => parse(priority)? <= parse(value)?,
        _ => false,
    };
    Ok(result)
}

fn tag_name(op: Operator, tags: &[Tag], value: &str) -> bool {
    match op {
        Operator::Equals => tags.iter().any(|t| t.tag == value),
        Operator::NotEquals => !tags.iter().any(|t| t.tag == value),
        Operator::Contains => tags.iter().any(|t| t.tag.contains(value)),
        Operator::NotContains => !tags.iter().any(|t| t.tag.contains(value)),
        _ => false,
    }
}

fn tag_value(op: Operator, tags: &[Tag], name: &str, value: &str) -> bool {
    let mut named = tags.iter().filter(|t| t.tag == name);
    match op {
        Operator::Equals => named.any(|t| t.value == value),
        Operator::NotEquals => !named.any(|t| t.value == value),
        Operator::Contains => named.any(|t| t.value.contains(value)),
        Operator::NotContains => !named.any(|t| t.value.contains(value)),
        _ => false,
    }
}
