//! Interest filter
//!
//! Narrows the aggregated notifications to those at least one subscriber
//! wants. Fan-out to individual subscribers happens at dispatch.

use tracing::debug;

use crate::config::NotifierConfig;
use crate::notification::Notification;

/// Keep routable notifications wanted by any subscriber, in input order
pub fn filter_notifications(
    config: &NotifierConfig,
    notifications: Vec<Notification>,
) -> Vec<Notification> {
    let total = notifications.len();
    let kept: Vec<Notification> = notifications
        .into_iter()
        .filter(|n| {
            if !n.is_routable() {
                debug!("Dropping {} for {}: resource has no owners", n.kind, n.resource.id);
                return false;
            }
            config
                .owners
                .iter()
                .any(|(name, subscriber)| config.wants(name, subscriber, n))
        })
        .collect();

    debug!("{} of {} notification(s) matched a subscriber", kept.len(), total);
    kept
}
