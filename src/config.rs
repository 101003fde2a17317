//! Subscription configuration
//!
//! Loaded once per run from a YAML file inside the catalog, after substituting
//! `${VAR}` tokens from the process environment.
//!
//! ## Example (eventcatalog.notifier.yml):
//! ```yaml
//! version: 1.0.0
//! eventcatalog_url: https://eventcatalog.example.com
//! match_policy: interest
//! owners:
//!   payments-team:
//!     events:
//!       - consumer-added
//!       - subscribed-schema-changed
//!     channels:
//!       - type: slack
//!         webhook: ${PAYMENTS_SLACK_WEBHOOK}
//!         headers:
//!           X-Source: eventcatalog
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::{Captures, Regex};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;
use url::Url;

use crate::error::ConfigError;
use crate::notification::{Notification, NotificationKind};

/// Parsed and validated notifier configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// Format version of the configuration file
    #[serde(default = "default_format_version")]
    pub version: String,

    /// Base URL of the published catalog, used for deep links
    #[serde(default)]
    pub eventcatalog_url: String,

    /// How subscribers are matched against notifications
    #[serde(default)]
    pub match_policy: MatchPolicy,

    /// Subscribers in file order
    #[serde(default)]
    pub owners: Subscribers,
}

/// Which subscribers a notification is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Subscriber lists the notification kind
    #[default]
    Interest,
    /// Subscriber lists the kind and is one of the resource owners
    Ownership,
}

/// A team or person who wants to hear about certain notification kinds
#[derive(Debug, Clone, Deserialize)]
pub struct Subscriber {
    #[serde(default)]
    pub events: Vec<NotificationKind>,
    #[serde(default)]
    pub channels: Vec<Channel>,
}

impl Subscriber {
    pub fn is_interested_in(&self, kind: &NotificationKind) -> bool {
        self.events.contains(kind)
    }
}

/// A webhook delivery target
#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    #[serde(rename = "type")]
    pub transport: ChannelType,
    pub webhook: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Channel transport
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ChannelType {
    Slack,
    Other(String),
}

impl From<String> for ChannelType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "slack" => ChannelType::Slack,
            _ => ChannelType::Other(value),
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelType::Slack => f.write_str("slack"),
            ChannelType::Other(name) => f.write_str(name),
        }
    }
}

/// Subscriber map that keeps the order of the configuration file
#[derive(Debug, Clone, Default)]
pub struct Subscribers(Vec<(String, Subscriber)>);

impl Subscribers {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Subscriber)> {
        self.0.iter().map(|(name, s)| (name.as_str(), s))
    }

    pub fn get(&self, name: &str) -> Option<&Subscriber> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Subscribers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = Subscribers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of subscriber name to subscription")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::new();
                while let Some((name, subscriber)) = map.next_entry::<String, Subscriber>()? {
                    entries.push((name, subscriber));
                }
                Ok(Subscribers(entries))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Subscribers::default())
            }
        }

        deserializer.deserialize_any(OrderedVisitor)
    }
}

fn default_format_version() -> String {
    "1.0.0".to_string()
}

/// `${VAR}` tokens that can be resolved from the environment
fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex")
    })
}

/// Any `${...}` left after interpolation, including names no variable can have
fn unresolved_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{[^}]+\}").expect("unresolved placeholder regex"))
}

/// Replace `${VAR}` tokens using `lookup`; unknown variables are left in place
pub fn interpolate_env<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    placeholder_pattern()
        .replace_all(text, |caps: &Captures| {
            lookup(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

impl NotifierConfig {
    /// Load, interpolate and validate a configuration file
    pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_yaml_str(&raw, |name| std::env::var(name).ok())?;
        for warning in config.unknown_kind_warnings() {
            warn!("{}", warning);
        }
        Ok(config)
    }

    /// Parse configuration text, resolving placeholders through `lookup`
    pub fn from_yaml_str<F>(raw: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interpolated = interpolate_env(raw, lookup);
        let config: NotifierConfig = serde_yaml::from_str(&interpolated)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unresolved placeholders and malformed webhook URLs
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, subscriber) in self.owners.iter() {
            for channel in &subscriber.channels {
                if let Some(found) = unresolved_pattern().find(&channel.webhook) {
                    return Err(ConfigError::UnresolvedPlaceholder {
                        subscriber: name.to_string(),
                        field: "webhook".to_string(),
                        placeholder: found.as_str().to_string(),
                    });
                }
                for (header, value) in &channel.headers {
                    if let Some(found) = unresolved_pattern().find(value) {
                        return Err(ConfigError::UnresolvedPlaceholder {
                            subscriber: name.to_string(),
                            field: format!("header '{}'", header),
                            placeholder: found.as_str().to_string(),
                        });
                    }
                }

                let invalid = |reason: String| ConfigError::InvalidWebhook {
                    subscriber: name.to_string(),
                    webhook: channel.webhook.clone(),
                    reason,
                };
                let url = Url::parse(&channel.webhook).map_err(|e| invalid(e.to_string()))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
                }
            }
        }
        Ok(())
    }

    /// Whether `subscriber` should receive `notification` under the configured policy
    pub fn wants(&self, name: &str, subscriber: &Subscriber, notification: &Notification) -> bool {
        if !subscriber.is_interested_in(&notification.kind) {
            return false;
        }
        match self.match_policy {
            MatchPolicy::Interest => true,
            MatchPolicy::Ownership => notification.resource.is_owned_by(name),
        }
    }

    /// Warnings for subscriber event lists naming kinds nothing produces
    pub fn unknown_kind_warnings(&self) -> Vec<String> {
        let matcher = SkimMatcherV2::default();
        let mut warnings = Vec::new();

        for (name, subscriber) in self.owners.iter() {
            for kind in subscriber.events.iter().filter(|k| !k.is_registered()) {
                let suggestion = NotificationKind::REGISTERED
                    .iter()
                    .filter_map(|known| {
                        matcher
                            .fuzzy_match(known.as_str(), kind.as_str())
                            .map(|score| (score, known.as_str()))
                    })
                    .max_by_key(|(score, _)| *score)
                    .map(|(_, known)| known);

                let mut warning = format!(
                    "Subscriber '{}' listens for unknown notification kind '{}'",
                    name, kind
                );
                if let Some(known) = suggestion {
                    warning.push_str(&format!(", did you mean '{}'?", known));
                }
                warnings.push(warning);
            }
        }

        warnings
    }
}
