//! Change Detection
//!
//! Each detector turns the list of changed files into notifications of one
//! kind. Detectors recover from per-file problems themselves (warn + skip);
//! an error returned here aborts the whole run.

mod consumers;
mod schema;

pub use schema::is_schema_file;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info_span};

use crate::catalog::Catalog;
use crate::error::Result;
use crate::git::{CommitRange, Vcs};
use crate::notification::{Metadata, Notification, NotificationKind};

use consumers::Direction;

/// Everything a detector reads. Shared read-only for the whole run.
pub struct DetectContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub vcs: &'a dyn Vcs,
    pub catalog_path: &'a Path,
    pub changed_files: &'a [PathBuf],
    pub commit_range: &'a CommitRange,
    /// Stamped on every notification of the run
    pub timestamp: DateTime<Utc>,
    pub environment: Option<String>,
}

impl<'a> DetectContext<'a> {
    pub fn new(
        catalog: &'a dyn Catalog,
        vcs: &'a dyn Vcs,
        catalog_path: &'a Path,
        changed_files: &'a [PathBuf],
        commit_range: &'a CommitRange,
    ) -> Self {
        Self {
            catalog,
            vcs,
            catalog_path,
            changed_files,
            commit_range,
            timestamp: Utc::now(),
            environment: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_environment(mut self, environment: Option<String>) -> Self {
        self.environment = environment;
        self
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            timestamp: self.timestamp,
            catalog_path: self.catalog_path.to_path_buf(),
            environment: self.environment.clone(),
        }
    }
}

/// One detector per notification kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    ConsumerAdded,
    ConsumerRemoved,
    SubscribedSchemaChanged,
}

impl Detector {
    /// Every detector, in the order the CLI runs them
    pub const ALL: [Detector; 3] = [
        Detector::ConsumerAdded,
        Detector::ConsumerRemoved,
        Detector::SubscribedSchemaChanged,
    ];

    pub fn kind(&self) -> NotificationKind {
        match self {
            Detector::ConsumerAdded => NotificationKind::ConsumerAdded,
            Detector::ConsumerRemoved => NotificationKind::ConsumerRemoved,
            Detector::SubscribedSchemaChanged => NotificationKind::SubscribedSchemaChanged,
        }
    }

    pub fn detect(&self, ctx: &DetectContext<'_>) -> Result<Vec<Notification>> {
        let kind = self.kind();
        let _span = info_span!("detect", kind = %kind).entered();

        let notifications = match self {
            Detector::ConsumerAdded => consumers::detect(ctx, Direction::Added)?,
            Detector::ConsumerRemoved => consumers::detect(ctx, Direction::Removed)?,
            Detector::SubscribedSchemaChanged => schema::detect(ctx)?,
        };

        debug!("{} {} notification(s)", notifications.len(), kind);
        Ok(notifications)
    }
}

/// Run `detectors` in order and concatenate their notifications
pub fn aggregate(detectors: &[Detector], ctx: &DetectContext<'_>) -> Result<Vec<Notification>> {
    let mut notifications = Vec::new();
    for detector in detectors {
        notifications.extend(detector.detect(ctx)?);
    }
    Ok(notifications)
}
