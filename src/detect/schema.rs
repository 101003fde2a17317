//! Subscribed schema change detection

use std::path::Path;

use tracing::{debug, warn};

use super::DetectContext;
use crate::differ::diff_resource_across_commits;
use crate::error::{CatalogError, Result};
use crate::notification::{Notification, NotificationKind, SchemaChange};

const SCHEMA_EXTENSIONS: [&str; 3] = ["json", "avro", "proto"];

/// Whether `path` looks like a message schema
pub fn is_schema_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SCHEMA_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

pub(super) fn detect(ctx: &DetectContext<'_>) -> Result<Vec<Notification>> {
    let mut notifications = Vec::new();

    for file in ctx.changed_files.iter().filter(|f| is_schema_file(f)) {
        let snapshots = diff_resource_across_commits(ctx.vcs, file, ctx.commit_range);
        if !snapshots.is_complete() {
            debug!("{} is missing at one end of the range, skipping", file.display());
            continue;
        }
        if snapshots.is_unchanged() {
            continue;
        }

        let message = match ctx.catalog.message_by_schema_path(file) {
            Ok(message) => message,
            Err(CatalogError::UnlinkedSchema(_)) => {
                debug!("{} is not linked to any message", file.display());
                continue;
            }
            Err(e) => {
                warn!("Skipping schema {}: {}", file.display(), e);
                continue;
            }
        };

        let consumers = match ctx.catalog.consumers_of_schema(file) {
            Ok(consumers) => consumers,
            Err(e) => {
                warn!("Could not resolve consumers of {}: {}", message.id, e);
                continue;
            }
        };
        if consumers.is_empty() {
            debug!("{} changed but has no consumers", message.id);
            continue;
        }

        let change = SchemaChange {
            before: snapshots.before.trim().to_string(),
            after: snapshots.after.trim().to_string(),
            diff: snapshots.diff(),
        };
        let resource = message.to_resource(ctx.catalog.owners_for(&message.id));

        for consumer in consumers {
            let consumer = consumer.to_resource(ctx.catalog.owners_for(&consumer.id));
            notifications.push(
                Notification::new(
                    NotificationKind::SubscribedSchemaChanged,
                    resource.clone(),
                    consumer,
                    ctx.metadata(),
                )
                .with_schema_change(change.clone()),
            );
        }
    }

    Ok(notifications)
}
