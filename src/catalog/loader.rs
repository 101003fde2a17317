//! Catalog Loading
//!
//! Walks an EventCatalog directory once, indexes services, messages, teams
//! and users by their frontmatter, and answers `Catalog` queries from the index.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{frontmatter, version_string, Catalog, MessageResource, ServiceDescriptor};
use crate::error::CatalogError;
use crate::notification::{Owner, ResourceKind};

/// Configuration for catalog loading
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Directory names never descended into
    pub skip_dirs: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            skip_dirs: vec![
                ".git".to_string(),                // Git repository
                "node_modules".to_string(),        // Node.js dependencies
                "dist".to_string(),                // Built site
                ".eventcatalog-core".to_string(),  // Catalog build cache
                "versioned".to_string(),           // Historical resource versions
            ],
        }
    }
}

/// Frontmatter shared by messages
#[derive(Debug, Deserialize)]
struct MessageFrontmatter {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, deserialize_with = "version_string")]
    version: Option<String>,
    #[serde(default)]
    owners: Vec<Owner>,
    #[serde(default, rename = "schemaPath")]
    schema_path: Option<String>,
}

/// Frontmatter of a team or user page
#[derive(Debug, Deserialize)]
struct PersonFrontmatter {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
struct IndexedService {
    path: PathBuf,
    service: ServiceDescriptor,
}

#[derive(Debug, Clone)]
struct IndexedMessage {
    dir: PathBuf,
    message: MessageResource,
}

/// `Catalog` backed by an EventCatalog directory on disk
#[derive(Debug, Clone)]
pub struct FsCatalog {
    root: PathBuf,
    services: Vec<IndexedService>,
    messages: Vec<IndexedMessage>,
    people: HashMap<String, Owner>,
}

impl FsCatalog {
    /// Index the catalog at `root` with the default configuration
    pub fn open(root: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::open_with(root, &LoadConfig::default())
    }

    /// Index the catalog at `root`
    pub fn open_with(root: impl AsRef<Path>, config: &LoadConfig) -> Result<Self, CatalogError> {
        let root = normalize(root.as_ref());
        let mut catalog = Self {
            root: root.clone(),
            services: Vec::new(),
            messages: Vec::new(),
            people: HashMap::new(),
        };

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && entry.depth() > 0
                    && config.skip_dirs.iter().any(|d| entry.file_name() == d.as_str()))
            });

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().is_file() || !is_markdown(path) {
                continue;
            }
            if let Err(e) = catalog.index_file(path) {
                warn!("Skipping {}: {}", path.display(), e);
            }
        }

        debug!(
            "Indexed {} services, {} messages, {} teams/users in {}",
            catalog.services.len(),
            catalog.messages.len(),
            catalog.people.len(),
            catalog.root.display()
        );
        Ok(catalog)
    }

    fn index_file(&mut self, path: &Path) -> Result<(), CatalogError> {
        let is_index = matches!(file_name(path), Some("index.md" | "index.mdx"));
        let parent_dir = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str());

        if !is_index {
            // teams/<id>.mdx and users/<id>.mdx
            if matches!(parent_dir, Some("teams" | "users")) {
                let person: PersonFrontmatter = read_frontmatter(path)?;
                let owner = match person.name {
                    Some(name) => Owner::named(person.id.clone(), name),
                    None => Owner::new(person.id.clone()),
                };
                self.people.insert(person.id, owner);
            }
            return Ok(());
        }

        let Some(kind) = collection_kind(path) else {
            return Ok(());
        };

        match kind {
            ResourceKind::Service => {
                let service: ServiceDescriptor = read_frontmatter(path)?;
                self.services.push(IndexedService {
                    path: path.to_path_buf(),
                    service,
                });
            }
            kind => {
                let fm: MessageFrontmatter = read_frontmatter(path)?;
                let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
                self.messages.push(IndexedMessage {
                    dir,
                    message: MessageResource {
                        name: fm.name.unwrap_or_else(|| fm.id.clone()),
                        id: fm.id,
                        version: fm.version,
                        kind,
                        owners: fm.owners,
                        schema_path: fm.schema_path,
                    },
                });
            }
        }
        Ok(())
    }

    fn resolve_owner(&self, owner: &Owner) -> Owner {
        match self.people.get(&owner.id) {
            Some(person) if person.name.is_some() => person.clone(),
            _ => owner.clone(),
        }
    }

    /// Schemas are linked only through a declared `schemaPath`
    fn find_message_by_schema(&self, path: &Path) -> Option<&IndexedMessage> {
        let path = normalize(path);
        self.messages.iter().find(|m| {
            m.message
                .schema_path
                .as_ref()
                .is_some_and(|schema| normalize(&m.dir.join(schema)) == path)
        })
    }
}

impl Catalog for FsCatalog {
    fn is_service(&self, path: &Path) -> bool {
        matches!(file_name(path), Some("index.md" | "index.mdx"))
            && !path.components().any(|c| c.as_os_str() == "versioned")
            && collection_kind(path) == Some(ResourceKind::Service)
    }

    fn service_by_path(&self, path: &Path) -> Option<ServiceDescriptor> {
        let path = normalize(path);
        self.services
            .iter()
            .find(|s| s.path == path)
            .map(|s| s.service.clone())
    }

    fn parse_service(&self, text: &str) -> Result<ServiceDescriptor, CatalogError> {
        let block = frontmatter(text)
            .ok_or_else(|| CatalogError::MissingFrontmatter(PathBuf::from("<snapshot>")))?;
        serde_yaml::from_str(&block).map_err(|source| CatalogError::Frontmatter {
            path: PathBuf::from("<snapshot>"),
            source,
        })
    }

    fn message(&self, id: &str) -> Result<MessageResource, CatalogError> {
        self.messages
            .iter()
            .find(|m| m.message.id == id)
            .map(|m| m.message.clone())
            .ok_or_else(|| CatalogError::NotFound {
                kind: "message",
                id: id.to_string(),
            })
    }

    fn owners_for(&self, id: &str) -> Vec<Owner> {
        let owners = self
            .services
            .iter()
            .find(|s| s.service.id == id)
            .map(|s| &s.service.owners)
            .or_else(|| {
                self.messages
                    .iter()
                    .find(|m| m.message.id == id)
                    .map(|m| &m.message.owners)
            });

        owners
            .map(|owners| owners.iter().map(|o| self.resolve_owner(o)).collect())
            .unwrap_or_default()
    }

    fn message_by_schema_path(&self, path: &Path) -> Result<MessageResource, CatalogError> {
        self.find_message_by_schema(path)
            .map(|m| m.message.clone())
            .ok_or_else(|| CatalogError::UnlinkedSchema(path.to_path_buf()))
    }

    fn consumers_of_schema(&self, path: &Path) -> Result<Vec<ServiceDescriptor>, CatalogError> {
        let message = self.message_by_schema_path(path)?;
        Ok(self
            .services
            .iter()
            .filter(|s| s.service.receives.iter().any(|p| p.matches(&message)))
            .map(|s| s.service.clone())
            .collect())
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn is_markdown(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("md" | "mdx"))
}

/// `<collection>/<Name>/index.mdx` -> kind of `<collection>`
fn collection_kind(path: &Path) -> Option<ResourceKind> {
    let collection = path.parent()?.parent()?.file_name()?.to_str()?;
    match collection {
        "services" => Some(ResourceKind::Service),
        "events" => Some(ResourceKind::Event),
        "commands" => Some(ResourceKind::Command),
        "queries" => Some(ResourceKind::Query),
        _ => None,
    }
}

fn read_frontmatter<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CatalogError> {
    let content = fs::read_to_string(path)?;
    let block = frontmatter(&content)
        .ok_or_else(|| CatalogError::MissingFrontmatter(path.to_path_buf()))?;
    serde_yaml::from_str(&block).map_err(|source| CatalogError::Frontmatter {
        path: path.to_path_buf(),
        source,
    })
}

/// Canonical form of `path`, tolerating files that no longer exist
fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let parent = path.parent().and_then(|p| fs::canonicalize(p).ok());
    match (parent, path.file_name()) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}
