//! Resolution of a host's triggers into messages and their recipients.

use crate::api::ApiError;
use crate::conditions;
use crate::core::{Host, Message, MonitoringApi, Recipient, Trigger};
use crate::escalation;
use crate::internal_metrics::Metrics;
use futures::future::try_join_all;
use indexmap::IndexMap;
use itertools::Itertools;
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug)]
pub enum ResolveError {
    /// The requested host does not exist.
    #[error("{0}")]
    Lookup(String),

    #[error(transparent)]
    Upstream(#[from] ApiError),
}

/// Builds recipient reports from a monitoring API session.
#[derive(Debug, Clone)]
pub struct RecipientResolver {
    metrics: Metrics,
}

impl RecipientResolver {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }

    /// Resolves every trigger of `host_id` into the messages it would send
    /// and the users each message would reach.
    ///
    /// Any failed API call aborts the whole resolution.
    #[instrument(skip(self, api))]
    pub async fn resolve(&self, api: &dyn MonitoringApi, host_id: &str) -> Result<Host, ResolveError> {
        let start = Instant::now();
        let result = self.build_report(api, host_id).await;
        self.metrics.record_resolution(start.elapsed());

        match &result {
            Ok(host) => {
                self.metrics.reports_resolved_total.increment(1);
                info!(
                    host = %host.name,
                    triggers = host.triggers.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Resolved recipient report."
                );
            }
            Err(ResolveError::Lookup(reason)) => {
                self.metrics.reports_not_found_total.increment(1);
                debug!(reason, "Host lookup failed.");
            }
            Err(ResolveError::Upstream(e)) => {
                self.metrics.reports_failed_total.increment(1);
                warn!(error = %e, "Recipient resolution aborted.");
            }
        }
        result
    }

    async fn build_report(&self, api: &dyn MonitoringApi, host_id: &str) -> Result<Host, ResolveError> {
        let host = api
            .get_host(host_id)
            .await?
            .ok_or_else(|| ResolveError::Lookup(format!("Host with ID {} was not found", host_id)))?;
        let mut report = Host {
            hostid: host.hostid,
            name: host.name,
            triggers: IndexMap::new(),
        };

        let records = api.get_triggers(host_id).await?;
        if records.is_empty() {
            debug!("Host has no triggers.");
            return Ok(report);
        }
        let mut triggers: Vec<Trigger> = records.into_iter().map(Trigger::from_record).collect();

        let template_trigger_ids: Vec<String> = triggers
            .iter()
            .map(|t| t.tmpl_triggerid.clone())
            .unique()
            .collect();
        let trigger_ids: Vec<String> = triggers.iter().map(|t| t.triggerid.clone()).collect();
        let (templates, actions, media_types) = tokio::try_join!(
            api.get_templates(&template_trigger_ids),
            api.get_actions(&trigger_ids),
            api.get_media_types(),
        )?;

        for trigger in &mut triggers {
            trigger.select_templates(&templates);
            let mut messages = Vec::new();
            for action in conditions::select_actions(trigger, &actions)? {
                messages.extend(escalation::build_messages(action, &media_types)?);
            }
            trigger.messages = messages;
        }

        let group_ids: Vec<String> = all_messages(&triggers)
            .flat_map(|m| m.groups.iter().cloned())
            .unique()
            .collect();
        let members: HashMap<String, Vec<String>> = api
            .get_user_groups(&group_ids)
            .await?
            .into_iter()
            .map(|g| (g.usrgrpid, g.users.into_iter().map(|u| u.userid).collect()))
            .collect();

        let user_ids: Vec<String> = all_messages(&triggers)
            .flat_map(|m| expand_targets(m, &members))
            .unique()
            .collect();
        let users = api.get_users(&user_ids).await?;

        let resolved = try_join_all(users.iter().map(|user| async move {
            let (media, permission) = tokio::try_join!(
                api.get_media(&user.userid),
                api.get_permission(&user.userid, host_id),
            )?;
            Ok::<_, ApiError>((user.userid.clone(), Recipient::new(user, &media, permission)))
        }))
        .await?;
        let recipients: HashMap<String, Recipient> = resolved.into_iter().collect();

        let unresolved = user_ids.len().saturating_sub(recipients.len());
        if unresolved > 0 {
            debug!(unresolved, "Some referenced users could not be resolved.");
        }

        for trigger in &mut triggers {
            for message in &mut trigger.messages {
                message.recipients = expand_targets(message, &members)
                    .iter()
                    .map(|id| {
                        recipients
                            .get(id)
                            .cloned()
                            .unwrap_or_else(|| Recipient::unresolved(id))
                    })
                    .collect();
            }
        }

        report.triggers = triggers
            .into_iter()
            .map(|t| (t.triggerid.clone(), t))
            .collect();
        Ok(report)
    }
}

fn all_messages(triggers: &[Trigger]) -> impl Iterator<Item = &Message> {
    triggers.iter().flat_map(|t| t.messages.iter())
}

/// The user ids a message targets: direct users first, then the members of
/// each group in order. Users reached twice are listed twice.
fn expand_targets(message: &Message, members: &HashMap<String, Vec<String>>) -> Vec<String> {
    let group_members = message
        .groups
        .iter()
        .filter_map(|g| members.get(g))
        .flatten();
    message
        .users
        .iter()
        .chain(group_members)
        .cloned()
        .collect()
}
