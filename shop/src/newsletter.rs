//! Newsletter subscriptions. Mail delivery is someone else's job.

use crate::db::is_unique_violation;
use crate::error::{Result, ShopError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Boxed future returned by [`SubscriberList`] methods
pub type NewsletterFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A subscribed address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    /// Address as submitted (trimmed)
    pub email: String,
    /// When it subscribed
    pub subscribed_at: DateTime<Utc>,
}

/// Trim and sanity-check a submitted address.
///
/// # Errors
///
/// `Validation` when blank or missing an `@`.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim();
    if email.is_empty() {
        return Err(ShopError::validation("Email is required"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_string()),
        _ => Err(ShopError::validation("Invalid email address")),
    }
}

fn already_subscribed() -> ShopError {
    ShopError::conflict("Email already subscribed")
}

/// Subscriber persistence. Addresses are unique ignoring case.
pub trait SubscriberList: Send + Sync {
    /// Add a subscriber.
    ///
    /// # Errors
    ///
    /// `Conflict` "Email already subscribed" for a known address.
    fn subscribe(&self, subscriber: Subscriber) -> NewsletterFuture<'_, Subscriber>;

    /// Every subscriber, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn all(&self) -> NewsletterFuture<'_, Vec<Subscriber>>;
}

/// Subscribers kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriberList {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl InMemorySubscriberList {
    /// Create an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubscriberList for InMemorySubscriberList {
    fn subscribe(&self, subscriber: Subscriber) -> NewsletterFuture<'_, Subscriber> {
        let subscribers = Arc::clone(&self.subscribers);
        Box::pin(async move {
            let mut subscribers = subscribers
                .lock()
                .map_err(|_| ShopError::Storage("newsletter lock poisoned".to_string()))?;
            if subscribers
                .iter()
                .any(|s| s.email.eq_ignore_ascii_case(&subscriber.email))
            {
                return Err(already_subscribed());
            }
            subscribers.push(subscriber.clone());
            Ok(subscriber)
        })
    }

    fn all(&self) -> NewsletterFuture<'_, Vec<Subscriber>> {
        let subscribers = Arc::clone(&self.subscribers);
        Box::pin(async move {
            let subscribers = subscribers
                .lock()
                .map_err(|_| ShopError::Storage("newsletter lock poisoned".to_string()))?;
            Ok(subscribers.iter().rev().cloned().collect())
        })
    }
}

/// Subscribers backed by the `newsletter_subscribers` table.
#[derive(Clone)]
pub struct PostgresSubscriberList {
    pool: PgPool,
}

impl PostgresSubscriberList {
    /// Create a list over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SubscriberList for PostgresSubscriberList {
    fn subscribe(&self, subscriber: Subscriber) -> NewsletterFuture<'_, Subscriber> {
        Box::pin(async move {
            sqlx::query("INSERT INTO newsletter_subscribers (email, subscribed_at) VALUES ($1, $2)")
                .bind(&subscriber.email)
                .bind(subscriber.subscribed_at)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        already_subscribed()
                    } else {
                        ShopError::storage("subscribe", e)
                    }
                })?;
            Ok(subscriber)
        })
    }

    fn all(&self) -> NewsletterFuture<'_, Vec<Subscriber>> {
        Box::pin(async move {
            let rows: Vec<(String, DateTime<Utc>)> = sqlx::query_as(
                "SELECT email, subscribed_at FROM newsletter_subscribers ORDER BY subscribed_at DESC",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ShopError::storage("list subscribers", e))?;
            Ok(rows
                .into_iter()
                .map(|(email, subscribed_at)| Subscriber { email, subscribed_at })
                .collect())
        })
    }
}
