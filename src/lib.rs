//! EventCatalog Notifier
//!
//! Watches an EventCatalog stored in git and tells the teams that care when
//! something they depend on changes between two revisions.
//!
//! ## Pipeline
//!
//! ```text
//! git range ──► changed files ──► detectors ──► aggregate ──► filter ──► dispatch
//!                                    │                                     │
//!                                 catalog                            render + webhook
//! ```
//!
//! - **Detection**: consumer added, consumer removed and subscribed schema
//!   changed, computed from before/after snapshots of catalog files
//! - **Filtering**: only notifications some subscriber listens for survive
//! - **Dispatch**: rendered per subscriber channel, previewed or sent

pub mod catalog;
pub mod config;
pub mod detect;
pub mod differ;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod git;
pub mod notification;
pub mod render;
pub mod settings;

pub use catalog::{validate_root, Catalog, FsCatalog};
pub use config::{MatchPolicy, NotifierConfig};
pub use detect::{aggregate, DetectContext, Detector};
pub use dispatch::{dispatch, DispatchOptions, DispatchReport, HttpTransport, WebhookTransport};
pub use error::{NotifierError, Result};
pub use filter::filter_notifications;
pub use git::{CommitRange, GitRepository, Vcs};
pub use notification::{Notification, NotificationKind};
pub use render::Stage;
pub use settings::NotifierSettings;
