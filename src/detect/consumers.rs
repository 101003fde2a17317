//! Consumer added / removed detection
//!
//! Compares the `receives` list of every changed service between the two
//! revisions and emits one notification per (service, message) difference.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::DetectContext;
use crate::catalog::{MessagePointer, ServiceDescriptor};
use crate::differ::diff_resource_across_commits;
use crate::error::Result;
use crate::notification::{Notification, NotificationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Direction {
    /// after − before
    Added,
    /// before − after
    Removed,
}

impl Direction {
    fn kind(&self) -> NotificationKind {
        match self {
            Direction::Added => NotificationKind::ConsumerAdded,
            Direction::Removed => NotificationKind::ConsumerRemoved,
        }
    }

    /// Message ids present on one side only, in declaration order, once each
    fn difference<'a>(
        &self,
        before: &'a ServiceDescriptor,
        after: &'a ServiceDescriptor,
    ) -> Vec<&'a str> {
        let (from, against) = match self {
            Direction::Added => (&after.receives, &before.receives),
            Direction::Removed => (&before.receives, &after.receives),
        };
        let excluded: HashSet<&str> = against.iter().map(|p| p.id.as_str()).collect();

        let mut seen = HashSet::new();
        from.iter()
            .map(|p: &MessagePointer| p.id.as_str())
            .filter(|id| !excluded.contains(id) && seen.insert(*id))
            .collect()
    }
}

pub(super) fn detect(ctx: &DetectContext<'_>, direction: Direction) -> Result<Vec<Notification>> {
    let mut notifications = Vec::new();

    for file in ctx.changed_files.iter().filter(|f| ctx.catalog.is_service(f)) {
        if ctx.catalog.service_by_path(file).is_none() {
            debug!("{} no longer defines a service, skipping", file.display());
            continue;
        }

        let snapshots = diff_resource_across_commits(ctx.vcs, file, ctx.commit_range);
        let (before, after) = match (
            ctx.catalog.parse_service(&snapshots.before),
            ctx.catalog.parse_service(&snapshots.after),
        ) {
            (Ok(before), Ok(after)) => (before, after),
            _ => {
                debug!("{} is not a service at both revisions, skipping", file.display());
                continue;
            }
        };

        let changed = direction.difference(&before, &after);
        if changed.is_empty() {
            continue;
        }
        let consumer = after.to_resource(ctx.catalog.owners_for(&after.id));

        for message_id in changed {
            let message = match ctx.catalog.message(message_id) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Skipping {} of {}: {}", message_id, after.id, e);
                    continue;
                }
            };

            let resource = message.to_resource(ctx.catalog.owners_for(&message.id));
            notifications.push(Notification::new(
                direction.kind(),
                resource,
                consumer.clone(),
                ctx.metadata(),
            ));
        }
    }

    Ok(notifications)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use crate::catalog::MessageResource;
    use crate::detect::testing::{FakeCatalog, FakeVcs};
    use crate::detect::Detector;
    use crate::git::CommitRange;
    use crate::notification::{Owner, ResourceKind};

    const SERVICE: &str = "/catalog/services/InventoryService/index.mdx";

    fn service_text(receives: &[&str]) -> String {
        let mut text =
            String::from("---\nid: InventoryService\nname: Inventory Service\nversion: 0.0.2\n");
        if !receives.is_empty() {
            text.push_str("receives:\n");
            for id in receives {
                text.push_str(&format!("  - id: {}\n", id));
            }
        }
        text.push_str("---\n# Inventory\n");
        text
    }

    fn event(id: &str) -> MessageResource {
        MessageResource {
            id: id.to_string(),
            name: format!("{} event", id),
            version: Some("0.0.1".to_string()),
            kind: ResourceKind::Event,
            owners: vec![],
            schema_path: None,
        }
    }

    fn catalog() -> FakeCatalog {
        let mut catalog = FakeCatalog::default();
        let current = serde_yaml::from_str("id: InventoryService").unwrap();
        catalog.services.insert(PathBuf::from(SERVICE), current);
        catalog.messages = vec![
            event("GetInventoryList"),
            event("OrderPlaced"),
            event("OrderShipped"),
        ];
        catalog.owners.insert(
            "GetInventoryList".to_string(),
            vec![Owner::named("dboyne", "David Boyne")],
        );
        catalog
    }

    fn run(detector: Detector, before: &[&str], after: &[&str]) -> Vec<Notification> {
        let catalog = catalog();
        let vcs = FakeVcs::default()
            .with(SERVICE, "HEAD~1", &service_text(before))
            .with(SERVICE, "HEAD", &service_text(after));
        let changed = vec![PathBuf::from(SERVICE)];
        let range = CommitRange::parse("HEAD~1..HEAD").unwrap();
        let ctx = DetectContext::new(&catalog, &vcs, Path::new("/catalog"), &changed, &range);
        detector.detect(&ctx).unwrap()
    }

    #[test]
    fn test_consumer_added() {
        let notifications = run(Detector::ConsumerAdded, &[], &["GetInventoryList"]);
        assert_eq!(notifications.len(), 1);

        let n = &notifications[0];
        assert_eq!(n.kind, NotificationKind::ConsumerAdded);
        assert_eq!(n.resource.id, "GetInventoryList");
        assert_eq!(n.resource.kind, ResourceKind::Event);
        assert_eq!(n.resource.owners, vec![Owner::named("dboyne", "David Boyne")]);
        assert_eq!(n.consumer.id, "InventoryService");
        assert_eq!(n.consumer.name, "Inventory Service");
        assert_eq!(n.consumer.version.as_deref(), Some("0.0.2"));
        assert_eq!(n.consumer.kind, ResourceKind::Service);
        assert!(n.consumer.owners.is_empty());
        assert_eq!(n.metadata.catalog_path, PathBuf::from("/catalog"));
        assert!(n.schema_change.is_none());
    }

    #[test]
    fn test_added_and_removed_are_set_differences() {
        let before = ["GetInventoryList", "OrderPlaced"];
        let after = ["OrderPlaced", "OrderShipped", "OrderShipped"];

        let added: Vec<_> = run(Detector::ConsumerAdded, &before, &after)
            .into_iter()
            .map(|n| n.resource.id)
            .collect();
        assert_eq!(added, vec!["OrderShipped"]);

        let removed: Vec<_> = run(Detector::ConsumerRemoved, &before, &after)
            .into_iter()
            .map(|n| n.resource.id)
            .collect();
        assert_eq!(removed, vec!["GetInventoryList"]);
    }

    #[test]
    fn test_equal_sets_emit_nothing() {
        let same = ["GetInventoryList", "OrderPlaced"];
        let reordered = ["OrderPlaced", "GetInventoryList"];
        assert!(run(Detector::ConsumerAdded, &same, &reordered).is_empty());
        assert!(run(Detector::ConsumerRemoved, &same, &reordered).is_empty());
    }

    #[test]
    fn test_new_service_is_skipped() {
        let catalog = catalog();
        let vcs = FakeVcs::default().with(SERVICE, "HEAD", &service_text(&["GetInventoryList"]));
        let changed = vec![PathBuf::from(SERVICE)];
        let range = CommitRange::parse("HEAD~1..HEAD").unwrap();
        let ctx = DetectContext::new(&catalog, &vcs, Path::new("/catalog"), &changed, &range);

        assert!(Detector::ConsumerAdded.detect(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_message_is_skipped() {
        let notifications = run(Detector::ConsumerAdded, &[], &["NotInCatalog", "OrderPlaced"]);
        let ids: Vec<_> = notifications.iter().map(|n| n.resource.id.as_str()).collect();
        assert_eq!(ids, vec!["OrderPlaced"]);
    }
}
