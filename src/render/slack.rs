//! Slack incoming-webhook payloads

use serde::Serialize;

use super::{Color, RenderedMessage};

pub const FOOTER: &str = "EventCatalog Notifier • eventcatalog.dev";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackPayload {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub color: Color,
    pub pretext: String,
    pub fields: Vec<Field>,
    pub footer: &'static str,
    /// Seconds since the epoch
    pub ts: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl From<&RenderedMessage> for SlackPayload {
    fn from(message: &RenderedMessage) -> Self {
        let fields = message
            .sections
            .iter()
            .map(|s| Field {
                title: s.title.clone(),
                value: s.value.clone(),
                short: !s.full_width,
            })
            .collect();

        SlackPayload {
            text: message.summary_text.clone(),
            attachments: vec![Attachment {
                color: message.color,
                pretext: message.pretext.clone(),
                fields,
                footer: FOOTER,
                ts: message.timestamp.timestamp(),
            }],
        }
    }
}
