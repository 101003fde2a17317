//! Wording for each registered notification kind

use super::{format_timestamp, Color, Links, RenderedMessage, Section, Stage, NO_OWNERS};
use crate::notification::Notification;

pub(super) fn consumer_added(
    links: &Links<'_>,
    n: &Notification,
    stage: Stage,
) -> RenderedMessage {
    let (summary_text, pretext) = if stage.is_draft() {
        (
            "🔄 EventCatalog - ✉️ Request to Add Event Consumer".to_string(),
            "A request has been made to add a new consumer of an event in your architecture"
                .to_string(),
        )
    } else {
        (
            "🆕 EventCatalog - ✉️ New Event Consumer Added".to_string(),
            "A new service has started consuming an event in your architecture".to_string(),
        )
    };
    let label = n.resource.kind.label();
    let impact = if stage.is_draft() {
        format!(
            "The *{}* service is proposing to depend on the *{}* {}.",
            n.consumer.name,
            n.resource.name,
            label.to_lowercase()
        )
    } else {
        format!(
            "The *{}* service is now dependent on the *{}* {}.",
            n.consumer.name,
            n.resource.name,
            label.to_lowercase()
        )
    };

    RenderedMessage {
        summary_text,
        pretext,
        color: Color::Good,
        sections: vec![
            Section::short(
                format!("📡 {} Being Consumed", label),
                links.resource(&n.resource, true),
            ),
            Section::short("⚙️ New Consumer Service", links.resource(&n.consumer, true)),
            Section::short(
                format!("👥 {} Owners (Need to Know)", label),
                links.owners(&n.resource.owners).unwrap_or_else(|| NO_OWNERS.to_string()),
            ),
            Section::short(
                "👥 Consumer Team",
                links.owners(&n.consumer.owners).unwrap_or_else(|| NO_OWNERS.to_string()),
            ),
            Section::short("📅 When", format_timestamp(&n.metadata.timestamp)),
            Section::wide("💼 Impact", impact),
        ],
        timestamp: n.metadata.timestamp,
    }
}

pub(super) fn consumer_removed(
    links: &Links<'_>,
    n: &Notification,
    stage: Stage,
) -> RenderedMessage {
    let (summary_text, pretext) = if stage.is_draft() {
        (
            "🔄 EventCatalog - 🗑️ Request to Remove Event Consumer".to_string(),
            "A request has been made to remove an event consumer in your architecture".to_string(),
        )
    } else {
        (
            "🗑️ EventCatalog - ✉️ Event Consumer Removed".to_string(),
            "A service has stopped consuming an event in your architecture".to_string(),
        )
    };
    let label = n.resource.kind.label();

    RenderedMessage {
        summary_text,
        pretext,
        color: Color::Warning,
        sections: vec![
            Section::short(
                format!("📡 {} No Longer Consumed", label),
                links.resource(&n.resource, true),
            ),
            Section::short(
                "⚙️ Service That Removed Consumption",
                links.resource(&n.consumer, true),
            ),
            Section::short(
                format!("👥 {} Owners (Need to Know)", label),
                links.owners(&n.resource.owners).unwrap_or_else(|| NO_OWNERS.to_string()),
            ),
            Section::short(
                "👥 Service Team",
                links.owners(&n.consumer.owners).unwrap_or_else(|| NO_OWNERS.to_string()),
            ),
            Section::short("📅 When", format_timestamp(&n.metadata.timestamp)),
            Section::wide(
                "💼 Impact",
                format!(
                    "The *{}* service is no longer dependent on the *{}* {}. \
                     This may affect downstream processing.",
                    n.consumer.name,
                    n.resource.name,
                    label.to_lowercase()
                ),
            ),
        ],
        timestamp: n.metadata.timestamp,
    }
}

pub(super) fn schema_changed(
    links: &Links<'_>,
    n: &Notification,
    stage: Stage,
    action_url: Option<&str>,
) -> RenderedMessage {
    let resource = &n.resource.name;
    let service = &n.consumer.name;
    let (summary_text, pretext, summary) = if stage.is_draft() {
        (
            format!("🔄 Proposed Schema Change: {}", resource),
            format!(
                "A change to the schema of {} consumed by {} has been proposed. \
                 It may impact this consumer. Please review the proposed update \
                 and validate compatibility before it goes live.",
                resource, service
            ),
            format!("The schema for {} is proposed to be updated.", resource),
        )
    } else {
        (
            format!("⚠️ Schema Change Detected: {}", resource),
            format!(
                "The schema of {} consumed by {} has been modified. \
                 This change is now live and may impact this consumer. \
                 Please review the update and validate compatibility.",
                resource, service
            ),
            format!("The schema for {} has been updated.", resource),
        )
    };
    let label = n.resource.kind.label();
    let diff = n
        .schema_change
        .as_ref()
        .map(|c| c.diff.clone())
        .unwrap_or_else(|| "No changes detected".to_string());

    let mut sections = vec![
        Section::short(format!("📧 {} Affected", label), links.resource(&n.resource, false)),
        Section::short("🏭 Consumer Service", links.resource(&n.consumer, false)),
        Section::short(
            "👥 Consumer Team",
            links.owners(&n.consumer.owners).unwrap_or_else(|| NO_OWNERS.to_string()),
        ),
        Section::short(
            format!("👤 {} Owners", label),
            links.owners(&n.resource.owners).unwrap_or_else(|| NO_OWNERS.to_string()),
        ),
        Section::short("📅 Changed At", format_timestamp(&n.metadata.timestamp)),
        Section::wide("📋 Summary of Change", summary),
        Section::wide("📄 Schema Diff", diff),
    ];
    if let Some(url) = action_url {
        sections.push(Section::short(
            "🔗 View Schema Changes",
            format!("<{}|View Schema Changes>", url),
        ));
    }

    RenderedMessage {
        summary_text,
        pretext,
        color: Color::Warning,
        sections,
        timestamp: n.metadata.timestamp,
    }
}
