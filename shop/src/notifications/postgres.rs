//! PostgreSQL notification store.

use super::{
    duplicate_notification, entry_not_found, not_your_entry, within_window, Delivery, InboxEntry, Notification,
    NotificationFuture, NotificationStore,
};
use crate::error::{Result, ShopError};
use crate::types::{InboxEntryId, NotificationId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::time::Duration;
use uuid::Uuid;

#[derive(FromRow)]
struct EntryRow {
    id: Uuid,
    notification_id: Uuid,
    user_id: String,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for InboxEntry {
    fn from(row: EntryRow) -> Self {
        Self {
            id: InboxEntryId::from_uuid(row.id),
            user_id: UserId::new(row.user_id),
            notification_id: NotificationId::from_uuid(row.notification_id),
            message: row.message,
            created_at: row.created_at,
            is_read: row.is_read,
        }
    }
}

const ENTRY_COLUMNS: &str = "id, notification_id, user_id, message, is_read, created_at";

/// Notification store backed by the `notifications` and `inbox_entries`
/// tables.
#[derive(Clone)]
pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    /// Create a store over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fan_out(
        &self,
        notification: Notification,
        recipients: Vec<UserId>,
        window: Duration,
    ) -> Result<Delivery> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShopError::storage("begin transaction", e))?;

        // Serializes concurrent sends so only one wins the duplicate window.
        sqlx::query("LOCK TABLE notifications IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(|e| ShopError::storage("lock notifications", e))?;

        let last: Option<DateTime<Utc>> = sqlx::query_scalar("SELECT MAX(created_at) FROM notifications")
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ShopError::storage("load latest notification", e))?;
        if last.is_some_and(|last| within_window(last, notification.created_at, window)) {
            return Err(duplicate_notification());
        }

        sqlx::query("INSERT INTO notifications (id, message, created_at) VALUES ($1, $2, $3)")
            .bind(notification.id.as_uuid())
            .bind(&notification.message)
            .bind(notification.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| ShopError::storage("insert notification", e))?;

        let entries: Vec<InboxEntry> = recipients
            .into_iter()
            .map(|user| InboxEntry::unread(&notification, user))
            .collect();
        let ids: Vec<Uuid> = entries.iter().map(|e| *e.id.as_uuid()).collect();
        let users: Vec<&str> = entries.iter().map(|e| e.user_id.as_str()).collect();

        sqlx::query(
            "INSERT INTO inbox_entries (id, notification_id, user_id, message, is_read, created_at)
             SELECT entry_id, $3, user_id, $4, FALSE, $5
             FROM UNNEST($1::UUID[], $2::TEXT[]) AS recipients(entry_id, user_id)",
        )
        .bind(&ids)
        .bind(&users)
        .bind(notification.id.as_uuid())
        .bind(&notification.message)
        .bind(notification.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| ShopError::storage("insert inbox entries", e))?;

        tx.commit()
            .await
            .map_err(|e| ShopError::storage("commit notification", e))?;
        Ok(Delivery { notification, entries })
    }
}

impl NotificationStore for PostgresNotificationStore {
    fn publish(
        &self,
        notification: Notification,
        recipients: Vec<UserId>,
        window: Duration,
    ) -> NotificationFuture<'_, Delivery> {
        Box::pin(self.fan_out(notification, recipients, window))
    }

    fn list(&self) -> NotificationFuture<'_, Vec<Notification>> {
        Box::pin(async move {
            let rows: Vec<(Uuid, String, DateTime<Utc>)> =
                sqlx::query_as("SELECT id, message, created_at FROM notifications ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| ShopError::storage("list notifications", e))?;
            Ok(rows
                .into_iter()
                .map(|(id, message, created_at)| Notification {
                    id: NotificationId::from_uuid(id),
                    message,
                    created_at,
                })
                .collect())
        })
    }

    fn inbox(&self, user: &UserId) -> NotificationFuture<'_, Vec<InboxEntry>> {
        let user = user.clone();
        Box::pin(async move {
            let rows: Vec<EntryRow> = sqlx::query_as(&format!(
                "SELECT {ENTRY_COLUMNS} FROM inbox_entries WHERE user_id = $1 ORDER BY created_at DESC"
            ))
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ShopError::storage("load inbox", e))?;
            Ok(rows.into_iter().map(InboxEntry::from).collect())
        })
    }

    fn mark_read(&self, user: &UserId, entry: InboxEntryId) -> NotificationFuture<'_, InboxEntry> {
        let user = user.clone();
        Box::pin(async move {
            let row: Option<EntryRow> = sqlx::query_as(&format!(
                "UPDATE inbox_entries SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING {ENTRY_COLUMNS}"
            ))
            .bind(entry.as_uuid())
            .bind(user.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ShopError::storage("mark notification read", e))?;
            if let Some(row) = row {
                return Ok(row.into());
            }

            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM inbox_entries WHERE id = $1)")
                .bind(entry.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| ShopError::storage("check notification", e))?;
            Err(if exists { not_your_entry() } else { entry_not_found() })
        })
    }

    fn mark_all_read(&self, user: &UserId) -> NotificationFuture<'_, Vec<InboxEntryId>> {
        let user = user.clone();
        Box::pin(async move {
            let ids: Vec<Uuid> = sqlx::query_scalar(
                "UPDATE inbox_entries SET is_read = TRUE WHERE user_id = $1 AND NOT is_read RETURNING id",
            )
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ShopError::storage("mark all notifications read", e))?;
            Ok(ids.into_iter().map(InboxEntryId::from_uuid).collect())
        })
    }
}
