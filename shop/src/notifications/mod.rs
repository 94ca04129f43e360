//! Admin notifications fanned out to per-user inboxes.
//!
//! Sending stores the notification and one unread inbox entry per known user
//! in one step, guarded by a duplicate window. Delivery and read events are
//! published on a [`NotificationHub`] for WebSocket clients.

pub mod hub;
pub mod memory;
pub mod postgres;

pub use hub::{InboxEvent, InboxEventKind, NotificationHub};
pub use memory::InMemoryNotificationStore;
pub use postgres::PostgresNotificationStore;

use crate::error::{Result, ShopError};
use crate::telemetry::names;
use crate::types::{InboxEntryId, NotificationId, UserId};
use crate::users::UserDirectory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::environment::Clock;

/// Boxed future returned by [`NotificationStore`] methods
pub type NotificationFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A message broadcast by an admin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Notification id
    pub id: NotificationId,
    /// Text shown to users
    pub message: String,
    /// When it was sent
    pub created_at: DateTime<Utc>,
}

/// One user's copy of a notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxEntry {
    /// Entry id
    pub id: InboxEntryId,
    /// Owner
    #[serde(skip)]
    pub user_id: UserId,
    /// Source notification
    #[serde(skip)]
    pub notification_id: NotificationId,
    /// Copied message text
    pub message: String,
    /// Copied send time
    pub created_at: DateTime<Utc>,
    /// Whether the owner has read it
    pub is_read: bool,
}

impl InboxEntry {
    pub(crate) fn unread(notification: &Notification, user_id: UserId) -> Self {
        Self {
            id: InboxEntryId::new(),
            user_id,
            notification_id: notification.id,
            message: notification.message.clone(),
            created_at: notification.created_at,
            is_read: false,
        }
    }
}

/// Result of a fan-out.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// The stored notification
    pub notification: Notification,
    /// One entry per recipient
    pub entries: Vec<InboxEntry>,
}

/// Persistence for notifications and inboxes.
pub trait NotificationStore: Send + Sync {
    /// Store `notification` and an unread entry for each recipient, unless
    /// the newest stored notification is younger than `window`.
    ///
    /// # Errors
    ///
    /// `Conflict` "Duplicate notification prevented" inside the window,
    /// `Storage` on backend failure.
    fn publish(
        &self,
        notification: Notification,
        recipients: Vec<UserId>,
        window: Duration,
    ) -> NotificationFuture<'_, Delivery>;

    /// All notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn list(&self) -> NotificationFuture<'_, Vec<Notification>>;

    /// A user's inbox, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn inbox(&self, user: &UserId) -> NotificationFuture<'_, Vec<InboxEntry>>;

    /// Mark one entry read. Already-read entries are returned unchanged.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown entry, `Forbidden` for another user's entry.
    fn mark_read(&self, user: &UserId, entry: InboxEntryId) -> NotificationFuture<'_, InboxEntry>;

    /// Mark every unread entry of `user` read, returning the ids that changed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn mark_all_read(&self, user: &UserId) -> NotificationFuture<'_, Vec<InboxEntryId>>;
}

pub(crate) fn duplicate_notification() -> ShopError {
    ShopError::conflict("Duplicate notification prevented")
}

pub(crate) fn entry_not_found() -> ShopError {
    ShopError::not_found("Notification not found")
}

pub(crate) fn not_your_entry() -> ShopError {
    ShopError::Forbidden("Not allowed to modify this notification".to_string())
}

/// True when a notification sent at `last` blocks one sent at `now`.
pub(crate) fn within_window(last: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now.signed_duration_since(last)
        .to_std()
        .map_or(true, |age| age < window)
}

/// Notification operations used by the HTTP layer.
#[derive(Clone)]
pub struct Notifications {
    store: Arc<dyn NotificationStore>,
    users: Arc<dyn UserDirectory>,
    hub: NotificationHub,
    clock: Arc<dyn Clock>,
    duplicate_window: Duration,
}

impl Notifications {
    /// Wire the service together
    #[must_use]
    pub fn new(
        store: Arc<dyn NotificationStore>,
        users: Arc<dyn UserDirectory>,
        hub: NotificationHub,
        clock: Arc<dyn Clock>,
        duplicate_window: Duration,
    ) -> Self {
        Self {
            store,
            users,
            hub,
            clock,
            duplicate_window,
        }
    }

    /// The event hub WebSocket clients subscribe to
    #[must_use]
    pub const fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    /// Send `message` to every known user.
    ///
    /// # Errors
    ///
    /// `Validation` for a blank message, `Conflict` inside the duplicate
    /// window, `Storage` on backend failure.
    pub async fn send(&self, message: &str) -> Result<Notification> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ShopError::validation("Message is required"));
        }

        let recipients = self.users.all().await?;
        let notification = Notification {
            id: NotificationId::new(),
            message: message.to_string(),
            created_at: self.clock.now(),
        };
        let delivery = self
            .store
            .publish(notification, recipients, self.duplicate_window)
            .await?;

        metrics::counter!(names::NOTIFICATIONS_SENT).increment(1);
        tracing::info!(
            notification_id = %delivery.notification.id,
            recipients = delivery.entries.len(),
            "Notification sent"
        );

        for entry in delivery.entries {
            self.hub.publish(InboxEvent::delivered(entry));
        }
        Ok(delivery.notification)
    }

    /// All notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    pub async fn list(&self) -> Result<Vec<Notification>> {
        self.store.list().await
    }

    /// The caller's inbox, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    pub async fn inbox(&self, user: &UserId) -> Result<Vec<InboxEntry>> {
        self.store.inbox(user).await
    }

    /// Mark one of the caller's entries read.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`, see [`NotificationStore::mark_read`].
    pub async fn mark_read(&self, user: &UserId, entry: InboxEntryId) -> Result<InboxEntry> {
        let was_unread = self
            .store
            .inbox(user)
            .await?
            .iter()
            .any(|e| e.id == entry && !e.is_read);
        let entry = self.store.mark_read(user, entry).await?;
        if was_unread {
            self.hub.publish(InboxEvent::read(user.clone(), vec![entry.id]));
        }
        Ok(entry)
    }

    /// Mark all of the caller's entries read; returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    pub async fn mark_all_read(&self, user: &UserId) -> Result<usize> {
        let changed = self.store.mark_all_read(user).await?;
        let count = changed.len();
        if count > 0 {
            self.hub.publish(InboxEvent::read(user.clone(), changed));
        }
        Ok(count)
    }
}
