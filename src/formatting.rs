//! HTML rendering of the host index and recipient reports.
//!
//! Templates are embedded at compile time. Everything they display is
//! computed here first, so the templates only iterate and print.

use crate::api::HostRecord;
use crate::core::{Host, Message, Recipient, Trigger};
use serde::Serialize;
use tera::{Context, Tera};

const TEMPLATES: [(&str, &str); 3] = [
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("recipients.html", include_str!("../templates/recipients.html")),
];

/// Renders the HTML pages of the web interface.
#[derive(Debug)]
pub struct Renderer {
    tera: Tera,
}

#[derive(Serialize)]
struct HostView<'a> {
    hostid: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct TriggerView<'a> {
    triggerid: &'a str,
    name: &'a str,
    severity: &'static str,
    messages: Vec<MessageView<'a>>,
}

#[derive(Serialize)]
struct MessageView<'a> {
    optype: String,
    actionname: &'a str,
    mediatypename: &'a str,
    subject: &'a str,
    steps: String,
    start_delay: &'a str,
    esc_period: &'a str,
    repeat_count: &'a str,
    /// Every recipient, rendered or not.
    total: usize,
    eligible: usize,
    rows: Vec<RecipientRow<'a>>,
}

/// One table row of a message.
#[derive(Debug, Serialize, PartialEq)]
pub struct RecipientRow<'a> {
    pub username: &'a str,
    pub fullname: &'a str,
    /// Addresses for the message's media type joined with `, `, or `-`.
    pub to: String,
    pub eligible: bool,
    pub has_right: bool,
}

impl Renderer {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES)?;
        Ok(Self { tera })
    }

    /// The landing page: a host id form, the selectable hosts and an
    /// optional error message.
    pub fn render_index(
        &self,
        hosts: &[HostRecord],
        hostid: &str,
        error: Option<&str>,
    ) -> Result<String, tera::Error> {
        let hosts: Vec<HostView<'_>> = hosts
            .iter()
            .map(|h| HostView {
                hostid: &h.hostid,
                name: &h.name,
            })
            .collect();

        let mut context = Context::new();
        context.insert("hosts", &hosts);
        context.insert("hostid", hostid);
        context.insert("error", &error);
        self.tera.render("index.html", &context)
    }

    /// The recipient report of a host.
    pub fn render_report(&self, host: &Host, show_unavailable: bool) -> Result<String, tera::Error> {
        let triggers: Vec<TriggerView<'_>> = host
            .triggers
            .values()
            .map(|t| trigger_view(t, show_unavailable))
            .collect();

        let mut context = Context::new();
        context.insert(
            "host",
            &HostView {
                hostid: &host.hostid,
                name: &host.name,
            },
        );
        context.insert("triggers", &triggers);
        self.tera.render("recipients.html", &context)
    }
}

fn trigger_view(trigger: &Trigger, show_unavailable: bool) -> TriggerView<'_> {
    TriggerView {
        triggerid: &trigger.triggerid,
        name: &trigger.name,
        severity: severity_label(&trigger.priority),
        messages: trigger
            .messages
            .iter()
            .map(|m| message_view(m, show_unavailable))
            .collect(),
    }
}

fn message_view(message: &Message, show_unavailable: bool) -> MessageView<'_> {
    let steps = match message.esc_step_to {
        0 => format!("{}-", message.esc_step_from),
        to if to == message.esc_step_from => to.to_string(),
        to => format!("{}-{}", message.esc_step_from, to),
    };
    let mediatypename = if message.mediatypename.is_empty() {
        message.mediatypeid.as_str()
    } else {
        message.mediatypename.as_str()
    };

    MessageView {
        optype: message.optype.to_string(),
        actionname: &message.actionname,
        mediatypename,
        subject: &message.subject,
        steps,
        start_delay: &message.start_delay,
        esc_period: &message.esc_period,
        repeat_count: &message.repeat_count,
        total: message.recipients.len(),
        eligible: message.eligible_recipients().count(),
        rows: recipient_rows(message, show_unavailable),
    }
}

/// The rows rendered for a message. Unresolved users are never shown; users
/// without access to the host are shown only when `show_unavailable` is set.
pub fn recipient_rows(message: &Message, show_unavailable: bool) -> Vec<RecipientRow<'_>> {
    message
        .recipients
        .iter()
        .filter(|r| r.show && (show_unavailable || r.has_right))
        .map(|r| RecipientRow {
            username: &r.username,
            fullname: r.fullname.as_deref().unwrap_or(""),
            to: send_to_column(r, &message.mediatypeid),
            eligible: r.is_eligible_for(&message.mediatypeid),
            has_right: r.has_right,
        })
        .collect()
}

fn send_to_column(recipient: &Recipient, mediatypeid: &str) -> String {
    match recipient.send_to(mediatypeid) {
        Some(sendto) => sendto.addresses().join(", "),
        None => "-".to_string(),
    }
}

fn severity_label(priority: &str) -> &'static str {
    match priority {
        "0" => "Not classified",
        "1" => "Information",
        "2" => "Warning",
        "3" => "Average",
        "4" => "High",
        "5" => "Disaster",
        _ => "Unknown",
    }
}
