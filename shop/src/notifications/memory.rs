//! In-memory notification store.

use super::{
    duplicate_notification, entry_not_found, not_your_entry, within_window, Delivery, InboxEntry, Notification,
    NotificationFuture, NotificationStore,
};
use crate::error::ShopError;
use crate::types::{InboxEntryId, UserId};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Tables {
    // Both in send order.
    notifications: Vec<Notification>,
    entries: Vec<InboxEntry>,
}

/// Notification store kept in process memory.
///
/// One lock covers notifications and inboxes, so the duplicate check and the
/// fan-out happen together.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryNotificationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ShopError {
    ShopError::Storage("notification lock poisoned".to_string())
}

impl NotificationStore for InMemoryNotificationStore {
    fn publish(
        &self,
        notification: Notification,
        recipients: Vec<UserId>,
        window: Duration,
    ) -> NotificationFuture<'_, Delivery> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let mut tables = tables.lock().map_err(|_| poisoned())?;
            if let Some(last) = tables.notifications.last() {
                if within_window(last.created_at, notification.created_at, window) {
                    return Err(duplicate_notification());
                }
            }

            let entries: Vec<InboxEntry> = recipients
                .into_iter()
                .map(|user| InboxEntry::unread(&notification, user))
                .collect();
            tables.notifications.push(notification.clone());
            tables.entries.extend(entries.iter().cloned());
            Ok(Delivery { notification, entries })
        })
    }

    fn list(&self) -> NotificationFuture<'_, Vec<Notification>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let tables = tables.lock().map_err(|_| poisoned())?;
            Ok(tables.notifications.iter().rev().cloned().collect())
        })
    }

    fn inbox(&self, user: &UserId) -> NotificationFuture<'_, Vec<InboxEntry>> {
        let tables = Arc::clone(&self.tables);
        let user = user.clone();
        Box::pin(async move {
            let tables = tables.lock().map_err(|_| poisoned())?;
            Ok(tables
                .entries
                .iter()
                .rev()
                .filter(|entry| entry.user_id == user)
                .cloned()
                .collect())
        })
    }

    fn mark_read(&self, user: &UserId, entry: InboxEntryId) -> NotificationFuture<'_, InboxEntry> {
        let tables = Arc::clone(&self.tables);
        let user = user.clone();
        Box::pin(async move {
            let mut tables = tables.lock().map_err(|_| poisoned())?;
            let found = tables
                .entries
                .iter_mut()
                .find(|e| e.id == entry)
                .ok_or_else(entry_not_found)?;
            if found.user_id != user {
                return Err(not_your_entry());
            }
            found.is_read = true;
            Ok(found.clone())
        })
    }

    fn mark_all_read(&self, user: &UserId) -> NotificationFuture<'_, Vec<InboxEntryId>> {
        let tables = Arc::clone(&self.tables);
        let user = user.clone();
        Box::pin(async move {
            let mut tables = tables.lock().map_err(|_| poisoned())?;
            let mut changed = Vec::new();
            for entry in tables.entries.iter_mut().filter(|e| e.user_id == user && !e.is_read) {
                entry.is_read = true;
                changed.push(entry.id);
            }
            Ok(changed)
        })
    }
}
