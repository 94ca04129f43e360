//! Directory of users the service has seen.
//!
//! The auth collaborator owns accounts; this directory only remembers which
//! verified user ids have called the service, so admin notifications have a
//! recipient list.

use crate::error::{Result, ShopError};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Boxed future returned by [`UserDirectory`] methods
pub type UserFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Known users.
pub trait UserDirectory: Send + Sync {
    /// Remember `user`; a user already known keeps its first-seen time.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn record(&self, user: &UserId, name: Option<&str>, now: DateTime<Utc>) -> UserFuture<'_, ()>;

    /// Every known user id.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn all(&self) -> UserFuture<'_, Vec<UserId>>;
}

/// Directory kept in process memory. Display names are not retained.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    // user id -> first seen
    users: Arc<Mutex<BTreeMap<UserId, DateTime<Utc>>>>,
}

impl InMemoryUserDirectory {
    /// Create an empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ShopError {
    ShopError::Storage("user directory lock poisoned".to_string())
}

impl UserDirectory for InMemoryUserDirectory {
    fn record(&self, user: &UserId, _name: Option<&str>, now: DateTime<Utc>) -> UserFuture<'_, ()> {
        let users = Arc::clone(&self.users);
        let user = user.clone();
        Box::pin(async move {
            let mut users = users.lock().map_err(|_| poisoned())?;
            users.entry(user).or_insert(now);
            Ok(())
        })
    }

    fn all(&self) -> UserFuture<'_, Vec<UserId>> {
        let users = Arc::clone(&self.users);
        Box::pin(async move {
            let users = users.lock().map_err(|_| poisoned())?;
            Ok(users.keys().cloned().collect())
        })
    }
}

/// Directory backed by the `users` table.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// Create a directory over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserDirectory for PostgresUserDirectory {
    fn record(&self, user: &UserId, name: Option<&str>, now: DateTime<Utc>) -> UserFuture<'_, ()> {
        let user = user.clone();
        let name = name.map(str::to_string);
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO users (user_id, name, first_seen) VALUES ($1, $2, $3)
                 ON CONFLICT (user_id) DO NOTHING",
            )
            .bind(user.as_str())
            .bind(name)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| ShopError::storage("record user", e))?;
            Ok(())
        })
    }

    fn all(&self) -> UserFuture<'_, Vec<UserId>> {
        Box::pin(async move {
            let ids: Vec<String> = sqlx::query_scalar("SELECT user_id FROM users ORDER BY user_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| ShopError::storage("list users", e))?;
            Ok(ids.into_iter().map(UserId::new).collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use storefront_testing::mocks::epoch;

    #[tokio::test]
    async fn recording_twice_keeps_one_entry() {
        let directory = InMemoryUserDirectory::new();
        let alice = UserId::new("alice");
        directory.record(&alice, Some("Alice"), epoch()).await.unwrap();
        directory.record(&alice, None, epoch()).await.unwrap();
        directory.record(&UserId::new("bob"), None, epoch()).await.unwrap();
        assert_eq!(directory.all().await.unwrap(), vec![alice, UserId::new("bob")]);
    }
}
