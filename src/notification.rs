//! Notification records produced by the detectors

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Format version stamped on every notification record
pub const NOTIFICATION_FORMAT_VERSION: Version = Version::new(1, 0, 0);

/// What kind of change a notification reports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationKind {
    /// A service started consuming a message
    ConsumerAdded,
    /// A service stopped consuming a message
    ConsumerRemoved,
    /// The schema of a message a service consumes changed
    SubscribedSchemaChanged,
    /// Any kind this build has no detector or renderer for
    Other(String),
}

impl NotificationKind {
    /// Kinds with a detector and a renderer
    pub const REGISTERED: [NotificationKind; 3] = [
        NotificationKind::ConsumerAdded,
        NotificationKind::ConsumerRemoved,
        NotificationKind::SubscribedSchemaChanged,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::ConsumerAdded => "consumer-added",
            NotificationKind::ConsumerRemoved => "consumer-removed",
            NotificationKind::SubscribedSchemaChanged => "subscribed-schema-changed",
            NotificationKind::Other(id) => id,
        }
    }

    pub fn is_registered(&self) -> bool {
        !matches!(self, NotificationKind::Other(_))
    }
}

impl From<String> for NotificationKind {
    fn from(id: String) -> Self {
        match id.as_str() {
            "consumer-added" => NotificationKind::ConsumerAdded,
            "consumer-removed" => NotificationKind::ConsumerRemoved,
            "subscribed-schema-changed" => NotificationKind::SubscribedSchemaChanged,
            _ => NotificationKind::Other(id),
        }
    }
}

impl From<&str> for NotificationKind {
    fn from(id: &str) -> Self {
        Self::from(id.to_string())
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of catalog resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Event,
    Command,
    Query,
    Service,
}

impl ResourceKind {
    /// Path segment used for documentation links (e.g. `/docs/events/...`)
    pub fn docs_segment(&self) -> &'static str {
        match self {
            ResourceKind::Event => "events",
            ResourceKind::Command => "commands",
            ResourceKind::Query => "queries",
            ResourceKind::Service => "services",
        }
    }

    /// Capitalised label for message text
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Event => "Event",
            ResourceKind::Command => "Command",
            ResourceKind::Query => "Query",
            ResourceKind::Service => "Service",
        }
    }
}

/// Resource owner (team or user), normalized from either a bare id or a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OwnerRef")]
pub struct Owner {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Owner {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// Owner as written in catalog frontmatter or notification payloads
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OwnerRef {
    Id(String),
    Record {
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
}

impl From<OwnerRef> for Owner {
    fn from(owner: OwnerRef) -> Self {
        match owner {
            OwnerRef::Id(id) => Owner { id, name: None },
            OwnerRef::Record { id, name } => Owner { id, name },
        }
    }
}

/// A catalog entity referenced by a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub owners: Vec<Owner>,
}

impl ResourceRef {
    /// Version label used in message text, `latest` when unversioned
    pub fn version_label(&self) -> &str {
        self.version.as_deref().unwrap_or("latest")
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owners.iter().any(|o| o.id == owner_id)
    }
}

/// Where and when a notification was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub timestamp: DateTime<Utc>,
    pub catalog_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

/// Schema bodies and rendered diff carried by schema-change notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaChange {
    pub before: String,
    pub after: String,
    pub diff: String,
}

/// A detected catalog change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "id")]
    pub kind: NotificationKind,
    #[serde(rename = "version")]
    pub schema_version: Version,
    pub resource: ResourceRef,
    pub consumer: ResourceRef,
    pub metadata: Metadata,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub schema_change: Option<SchemaChange>,
}

impl Notification {
    pub fn new(
        kind: NotificationKind,
        resource: ResourceRef,
        consumer: ResourceRef,
        metadata: Metadata,
    ) -> Self {
        Self {
            kind,
            schema_version: NOTIFICATION_FORMAT_VERSION,
            resource,
            consumer,
            metadata,
            schema_change: None,
        }
    }

    pub fn with_schema_change(mut self, change: SchemaChange) -> Self {
        self.schema_change = Some(change);
        self
    }

    /// Notifications without resource owners have nobody to route to
    pub fn is_routable(&self) -> bool {
        !self.resource.owners.is_empty()
    }
}
