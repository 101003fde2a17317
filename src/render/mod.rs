//! Message Rendering
//!
//! Turns a notification into channel-neutral message content. Rendering is a
//! pure function of (config, notification, stage, action url): the only clock
//! it reads is the notification's own timestamp.

mod messages;
pub mod slack;

pub use slack::SlackPayload;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::NotifierConfig;
use crate::notification::{Notification, NotificationKind, Owner, ResourceRef};

/// Lifecycle of the change being announced; only the wording differs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Proposed, e.g. from an open pull request
    Draft,
    /// Merged and live
    #[default]
    Active,
}

impl Stage {
    pub fn is_draft(&self) -> bool {
        matches!(self, Stage::Draft)
    }
}

/// Attachment colour hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Good,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub value: String,
    pub full_width: bool,
}

impl Section {
    fn short(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            full_width: false,
        }
    }

    fn wide(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            full_width: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub summary_text: String,
    pub pretext: String,
    pub color: Color,
    pub sections: Vec<Section>,
    /// Copied from the notification so channel adapters need no clock
    pub timestamp: DateTime<Utc>,
}

/// Render `notification`, or `None` when its kind has no renderer
pub fn render(
    config: &NotifierConfig,
    notification: &Notification,
    stage: Stage,
    action_url: Option<&str>,
) -> Option<RenderedMessage> {
    let links = Links::new(&config.eventcatalog_url);
    match &notification.kind {
        NotificationKind::ConsumerAdded => {
            Some(messages::consumer_added(&links, notification, stage))
        }
        NotificationKind::ConsumerRemoved => {
            Some(messages::consumer_removed(&links, notification, stage))
        }
        NotificationKind::SubscribedSchemaChanged => Some(messages::schema_changed(
            &links,
            notification,
            stage,
            action_url,
        )),
        NotificationKind::Other(kind) => {
            warn!("No message found for notification {}", kind);
            None
        }
    }
}

/// Deep links into the published catalog
struct Links<'a> {
    base: &'a str,
}

impl<'a> Links<'a> {
    fn new(base: &'a str) -> Self {
        Self {
            base: base.trim_end_matches('/'),
        }
    }

    /// `<url|*Name*> (v1.0.0)`
    fn resource(&self, resource: &ResourceRef, bold: bool) -> String {
        let name = if bold {
            format!("*{}*", resource.name)
        } else {
            resource.name.clone()
        };
        format!(
            "<{}/docs/{}/{}/{}|{}> (v{})",
            self.base,
            resource.kind.docs_segment(),
            resource.id,
            resource.version_label(),
            name,
            resource.version_label()
        )
    }

    /// Comma-joined team links, `None` when there are no owners
    fn owners(&self, owners: &[Owner]) -> Option<String> {
        if owners.is_empty() {
            return None;
        }
        let links: Vec<String> = owners
            .iter()
            .map(|o| format!("<{}/docs/teams/{}|{}>", self.base, o.id, o.id))
            .collect();
        Some(links.join(", "))
    }
}

const NO_OWNERS: &str = "No owners assigned";

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%B %-d, %Y at %I:%M %p UTC").to_string()
}
