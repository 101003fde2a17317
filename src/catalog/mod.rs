//! Catalog Access
//!
//! Read-only view of an EventCatalog directory: services, messages (events,
//! commands, queries), teams and users, all described by YAML frontmatter in
//! markdown files.
//!
//! ```text
//! catalog/
//! ├── eventcatalog.config.js
//! ├── domains/Orders/services/InventoryService/index.mdx
//! ├── services/PaymentGatewayService/index.mdx
//! ├── events/GetInventoryList/
//! │   ├── index.mdx          (schemaPath: schema.json)
//! │   └── schema.json
//! ├── teams/payments.mdx
//! └── users/dboyne.mdx
//! ```

mod loader;

pub use loader::{FsCatalog, LoadConfig};

use std::path::{Path, PathBuf};

use semver::{Version, VersionReq};
use serde::{Deserialize, Deserializer};

use crate::error::{CatalogError, ConfigError};
use crate::notification::{Owner, ResourceKind, ResourceRef};

/// Files whose presence marks a directory as an EventCatalog
pub const CATALOG_MARKERS: [&str; 4] = [
    "eventcatalog.config.js",
    "eventcatalog.config.ts",
    "eventcatalog.config.mjs",
    "eventcatalog.config.cjs",
];

/// Canonical catalog directory, checked for an EventCatalog marker file
pub fn validate_root(path: &Path) -> Result<PathBuf, ConfigError> {
    let root = path
        .canonicalize()
        .map_err(|_| ConfigError::MissingCatalog(path.to_path_buf()))?;
    if !root.is_dir() {
        return Err(ConfigError::MissingCatalog(path.to_path_buf()));
    }
    if !CATALOG_MARKERS.iter().any(|marker| root.join(marker).is_file()) {
        return Err(ConfigError::MissingCatalogConfig(root));
    }
    Ok(root)
}

/// Catalog queries used by the detectors
pub trait Catalog {
    /// Whether `path` is the definition file of a service
    fn is_service(&self, path: &Path) -> bool;

    /// The current service defined at `path`
    fn service_by_path(&self, path: &Path) -> Option<ServiceDescriptor>;

    /// Parse raw definition text (e.g. a historical snapshot) into a service
    fn parse_service(&self, text: &str) -> Result<ServiceDescriptor, CatalogError>;

    /// A message (event, command or query) by id
    fn message(&self, id: &str) -> Result<MessageResource, CatalogError>;

    /// Owners of any resource, resolved against the catalog's teams and users
    fn owners_for(&self, id: &str) -> Vec<Owner>;

    /// The message whose schema lives at `path`
    fn message_by_schema_path(&self, path: &Path) -> Result<MessageResource, CatalogError>;

    /// Services that receive the message whose schema lives at `path`
    fn consumers_of_schema(&self, path: &Path) -> Result<Vec<ServiceDescriptor>, CatalogError>;
}

/// Reference from a service to a message it sends or receives
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessagePointer {
    pub id: String,
    #[serde(default, deserialize_with = "version_string")]
    pub version: Option<String>,
}

impl MessagePointer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: None,
        }
    }

    /// Whether this pointer targets `message`. Versions may be exact, `latest`,
    /// `x` wildcards, or semver requirements such as `^1.0.0`.
    pub fn matches(&self, message: &MessageResource) -> bool {
        if self.id != message.id {
            return false;
        }
        let (Some(wanted), Some(actual)) = (self.version.as_deref(), message.version.as_deref())
        else {
            return true;
        };
        let wildcard = wanted.chars().all(|c| matches!(c, 'x' | '*' | '.'));
        if wanted == "latest" || wanted == actual || wildcard {
            return true;
        }

        let requirement = wanted.replace(".x", ".*");
        match (VersionReq::parse(&requirement), Version::parse(actual)) {
            (Ok(req), Ok(version)) => req.matches(&version),
            _ => false,
        }
    }
}

/// A service as described by its frontmatter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "version_string")]
    pub version: Option<String>,
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub receives: Vec<MessagePointer>,
    #[serde(default)]
    pub sends: Vec<MessagePointer>,
}

impl ServiceDescriptor {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Notification view of this service with the given (resolved) owners
    pub fn to_resource(&self, owners: Vec<Owner>) -> ResourceRef {
        ResourceRef {
            id: self.id.clone(),
            name: self.display_name().to_string(),
            version: self.version.clone(),
            kind: ResourceKind::Service,
            owners,
        }
    }
}

/// An event, command or query in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageResource {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub kind: ResourceKind,
    pub owners: Vec<Owner>,
    /// Schema file relative to the message directory
    pub schema_path: Option<String>,
}

impl MessageResource {
    pub fn to_resource(&self, owners: Vec<Owner>) -> ResourceRef {
        ResourceRef {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            kind: self.kind,
            owners,
        }
    }
}

/// Extract the YAML frontmatter block delimited by `---` lines
pub fn frontmatter(text: &str) -> Option<String> {
    let text = text.trim_start_matches('\u{feff}');
    let mut lines = text.lines();
    if lines.next()?.trim_end() != "---" {
        return None;
    }

    let mut block = Vec::new();
    for line in lines {
        if line.trim_end() == "---" {
            return Some(block.join("\n"));
        }
        block.push(line);
    }
    None
}

/// Frontmatter versions may be written unquoted (`1.0` parses as a number)
fn version_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
