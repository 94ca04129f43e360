//! Pub/sub channel for inbox events.

use super::InboxEntry;
use crate::types::{InboxEntryId, UserId};
use serde::Serialize;
use tokio::sync::broadcast;

/// What happened to an inbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboxEventKind {
    /// A new entry arrived
    Delivered {
        /// The entry
        entry: InboxEntry,
    },
    /// Entries were marked read
    Read {
        /// Entries that changed
        #[serde(rename = "entryIds")]
        entry_ids: Vec<InboxEntryId>,
    },
}

/// An inbox event addressed to one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboxEvent {
    /// Inbox owner
    pub user_id: UserId,
    /// The event
    pub kind: InboxEventKind,
}

impl InboxEvent {
    /// A new entry for its owner
    #[must_use]
    pub fn delivered(entry: InboxEntry) -> Self {
        Self {
            user_id: entry.user_id.clone(),
            kind: InboxEventKind::Delivered { entry },
        }
    }

    /// Entries of `user_id` marked read
    #[must_use]
    pub const fn read(user_id: UserId, entry_ids: Vec<InboxEntryId>) -> Self {
        Self {
            user_id,
            kind: InboxEventKind::Read { entry_ids },
        }
    }

    /// The event payload if it belongs to `user`
    #[must_use]
    pub fn for_user(self, user: &UserId) -> Option<InboxEventKind> {
        (self.user_id == *user).then_some(self.kind)
    }
}

/// Broadcast channel carrying every inbox event.
///
/// Subscribers filter by owner; a subscriber that falls behind skips ahead.
#[derive(Clone, Debug)]
pub struct NotificationHub {
    sender: broadcast::Sender<InboxEvent>,
}

impl NotificationHub {
    /// Create a hub buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Nobody listening is fine.
    pub fn publish(&self, event: InboxEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to every future event
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<InboxEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn read_event_serializes_with_tag() {
        let id = InboxEntryId::new();
        let json = serde_json::to_value(InboxEvent::read(UserId::new("a"), vec![id]).kind).unwrap();
        assert_eq!(json["event"], "read");
        assert_eq!(json["entryIds"][0], id.to_string());
    }

    #[test]
    fn events_are_filtered_by_owner() {
        let event = InboxEvent::read(UserId::new("a"), Vec::new());
        assert!(event.clone().for_user(&UserId::new("b")).is_none());
        assert!(event.for_user(&UserId::new("a")).is_some());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_harmless() {
        let hub = NotificationHub::new(4);
        hub.publish(InboxEvent::read(UserId::new("a"), Vec::new()));
        let mut rx = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        hub.publish(InboxEvent::read(UserId::new("a"), Vec::new()));
        assert_eq!(rx.recv().await.unwrap().user_id, UserId::new("a"));
    }
}
