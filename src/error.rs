//! Error types for the notifier

use std::path::PathBuf;

use thiserror::Error;

/// Result type for notifier operations
pub type Result<T> = std::result::Result<T, NotifierError>;

/// Top-level notifier errors
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NotifierError {
    /// Short headline shown to the user
    pub fn title(&self) -> String {
        match self {
            NotifierError::Config(e) => e.title().to_string(),
            NotifierError::Git(e) => e.title().to_string(),
            NotifierError::Catalog(_) => "Catalog could not be read".to_string(),
            NotifierError::Delivery(_) => "Notification delivery failed".to_string(),
            NotifierError::Json(_) => "An unexpected error occurred".to_string(),
        }
    }

    /// Remediation hints, if any
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            NotifierError::Config(e) => e.suggestions(),
            NotifierError::Git(e) => e.suggestions(),
            _ => Vec::new(),
        }
    }
}

/// Configuration errors. Fatal before any detection work begins.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("EventCatalog directory does not exist: {}", .0.display())]
    MissingCatalog(PathBuf),

    #[error("EventCatalog configuration file not found in {}", .0.display())]
    MissingCatalogConfig(PathBuf),

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid notifier configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Unresolved placeholder {placeholder} in {field} of subscriber '{subscriber}'")]
    UnresolvedPlaceholder {
        subscriber: String,
        field: String,
        placeholder: String,
    },

    #[error("Invalid webhook URL '{webhook}' for subscriber '{subscriber}': {reason}")]
    InvalidWebhook {
        subscriber: String,
        webhook: String,
        reason: String,
    },

    #[error("Settings error: {0}")]
    Settings(#[from] config_crate::ConfigError),
}

impl ConfigError {
    pub fn title(&self) -> &'static str {
        match self {
            ConfigError::MissingCatalog(_) => "EventCatalog directory not found",
            ConfigError::MissingCatalogConfig(_) => "Not an EventCatalog directory",
            ConfigError::Read { .. } | ConfigError::Parse(_) => {
                "Notifier configuration could not be loaded"
            }
            ConfigError::UnresolvedPlaceholder { .. } => "Missing environment variable",
            ConfigError::InvalidWebhook { .. } => "Invalid webhook URL",
            ConfigError::Settings(_) => "Notifier settings could not be loaded",
        }
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self {
            ConfigError::MissingCatalog(_) => vec![
                "Check the value passed to --catalog".to_string(),
            ],
            ConfigError::MissingCatalogConfig(_) => vec![
                "Make sure you're pointing to a valid EventCatalog directory".to_string(),
                "The directory must contain an eventcatalog.config.js file".to_string(),
            ],
            ConfigError::Read { .. } => vec![
                "Check the value passed to --config (resolved relative to the catalog)".to_string(),
            ],
            ConfigError::UnresolvedPlaceholder { placeholder, .. } => vec![
                format!("Export {} before running the notifier", placeholder),
                "In CI, add the variable to the job's secrets or environment".to_string(),
            ],
            ConfigError::InvalidWebhook { .. } => vec![
                "Webhooks must be absolute http(s) URLs".to_string(),
            ],
            ConfigError::Parse(_) | ConfigError::Settings(_) => Vec::new(),
        }
    }
}

/// Version-control errors, each with a user-facing title and remediation list
#[derive(Error, Debug)]
pub enum GitError {
    #[error("The specified directory is not a Git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error(
        "The commit range \"{range}\" doesn't exist in this repository \
         (unknown revision '{revision}')"
    )]
    UnknownRevision { range: String, revision: String },

    #[error("Invalid commit range \"{0}\"")]
    InvalidRange(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),
}

impl GitError {
    pub fn title(&self) -> &'static str {
        match self {
            GitError::NotARepository(_) => "Not a Git repository",
            GitError::UnknownRevision { .. } => "Git commit range not found",
            GitError::InvalidRange(_) => "Invalid commit range",
            GitError::Git(_) => "Git operation failed",
        }
    }

    pub fn suggestions(&self) -> Vec<String> {
        match self {
            GitError::NotARepository(_) => vec![
                "Make sure you're running this command in a Git repository.".to_string(),
                "Initialize Git with: git init".to_string(),
            ],
            GitError::UnknownRevision { .. } => vec![
                "This usually happens when:".to_string(),
                "• You're in a new repository with no previous commits".to_string(),
                "• The specified commit range is invalid".to_string(),
                "• The repository doesn't have enough commit history".to_string(),
                String::new(),
                "Solutions:".to_string(),
                "• For new repositories: Make at least 2 commits first".to_string(),
                "• Use a different commit range like: --commit-range HEAD~1..HEAD".to_string(),
                "• Check your git history with: git log --oneline".to_string(),
            ],
            GitError::InvalidRange(_) => vec![
                "Use A..B or A...B, e.g. --commit-range HEAD~1..HEAD".to_string(),
            ],
            GitError::Git(_) => Vec::new(),
        }
    }
}

/// Catalog lookup errors. Detectors recover from these per file.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("No frontmatter found in {}", .0.display())]
    MissingFrontmatter(PathBuf),

    #[error("Invalid frontmatter in {}: {source}", path.display())]
    Frontmatter {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("No message references schema {}", .0.display())]
    UnlinkedSchema(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Webhook delivery errors
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Webhook {endpoint} responded with {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to reach webhook {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Invalid header '{name}' for webhook {endpoint}")]
    InvalidHeader { endpoint: String, name: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl DeliveryError {
    /// The webhook that failed, if the failure was tied to one
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            DeliveryError::Status { endpoint, .. }
            | DeliveryError::Transport { endpoint, .. }
            | DeliveryError::InvalidHeader { endpoint, .. } => Some(endpoint),
            DeliveryError::Client(_) => None,
        }
    }
}
