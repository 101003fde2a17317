//! Runtime settings for the notifier
//!
//! Supports loading settings from:
//! - Default values
//! - Settings file (notifier.toml)
//! - Environment variables (NOTIFIER__*)
//!
//! Command-line flags override whatever is resolved here.
//!
//! ## Example settings file (notifier.toml):
//! ```toml
//! config_file = "eventcatalog.notifier.yml"
//! catalog = "./catalog"
//! commit_range = "origin/main...HEAD"
//! lifecycle = "draft"
//! environment = "staging"
//!
//! [http]
//! timeout_secs = 5
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::render::Stage;

/// Resolved runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierSettings {
    /// Subscription config file, relative to the catalog directory
    #[serde(default = "default_config_file")]
    pub config_file: String,

    /// Path to the EventCatalog directory
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,

    /// Git commit range to compare
    #[serde(default = "default_commit_range")]
    pub commit_range: String,

    /// Lifecycle stage used for message wording
    #[serde(default)]
    pub lifecycle: Stage,

    /// Environment label stamped on notification metadata
    #[serde(default)]
    pub environment: Option<String>,

    /// Webhook client settings
    #[serde(default)]
    pub http: HttpSettings,
}

/// Webhook client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent sent with webhook requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_config_file() -> String {
    "eventcatalog.notifier.yml".to_string()
}

fn default_catalog() -> PathBuf {
    PathBuf::from(".")
}

fn default_commit_range() -> String {
    "HEAD~1..HEAD".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("catalog-notifier/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            catalog: default_catalog(),
            commit_range: default_commit_range(),
            lifecycle: Stage::default(),
            environment: None,
            http: HttpSettings::default(),
        }
    }
}

impl NotifierSettings {
    /// Load settings, additionally reading a specific file
    pub fn load_from(settings_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let settings_locations = ["notifier.toml", ".notifier.toml"];

        for location in settings_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        let project_dirs = directories::ProjectDirs::from("dev", "eventcatalog", "notifier");
        if let Some(config_dir) = project_dirs {
            let xdg_config = config_dir.config_dir().join("notifier.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = settings_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (NOTIFIER__*)
        builder = builder.add_source(
            Environment::with_prefix("NOTIFIER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build()?;
        settings.try_deserialize()
    }

    /// Absolute path of the subscription config file
    pub fn config_path(&self) -> PathBuf {
        self.catalog.join(&self.config_file)
    }
}
