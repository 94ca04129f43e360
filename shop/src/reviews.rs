//! Product reviews.

use crate::error::{Result, ShopError};
use crate::types::{ProductId, ReviewId, UserId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Boxed future returned by [`ReviewStore`] methods
pub type ReviewFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A star rating from 1 to 5.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    /// Validate a rating as sent by a client: a whole number from 1 to 5,
    /// given as a JSON number or numeric string.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for anything else.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let invalid = || ShopError::validation("Rating must be a whole number from 1 to 5");
        let number = match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(invalid)?;
        u8::try_from(number)
            .ok()
            .filter(|n| (1..=5).contains(n))
            .map(Self)
            .ok_or_else(invalid)
    }

    /// The number of stars
    #[must_use]
    pub const fn stars(self) -> u8 {
        self.0
    }
}

/// A stored review.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Review id
    pub id: ReviewId,
    /// Reviewed product
    pub product_id: ProductId,
    /// Author
    pub user_id: UserId,
    /// Display name of the author
    #[serde(rename = "name")]
    pub reviewer_name: String,
    /// Stars
    pub rating: Rating,
    /// Free text, possibly empty
    pub comment: String,
    /// When it was written
    pub created_at: DateTime<Utc>,
}

/// Average rating of a product.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    /// Mean stars rounded to one decimal, `0` without reviews
    pub average: f64,
    /// Number of reviews
    pub total_reviews: u64,
}

impl RatingSummary {
    /// Summarize `count` reviews whose stars add up to `sum`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_totals(sum: u64, count: u64) -> Self {
        if count == 0 {
            return Self {
                average: 0.0,
                total_reviews: 0,
            };
        }
        let mean = sum as f64 / count as f64;
        Self {
            average: (mean * 10.0).round() / 10.0,
            total_reviews: count,
        }
    }
}

/// Review persistence.
pub trait ReviewStore: Send + Sync {
    /// Store a review.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn add(&self, review: Review) -> ReviewFuture<'_, Review>;

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn for_product(&self, product: ProductId) -> ReviewFuture<'_, Vec<Review>>;

    /// Average rating of a product.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn summary(&self, product: ProductId) -> ReviewFuture<'_, RatingSummary>;
}

/// Reviews kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReviewStore {
    reviews: Arc<Mutex<HashMap<ProductId, Vec<Review>>>>,
}

impl InMemoryReviewStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ShopError {
    ShopError::Storage("review lock poisoned".to_string())
}

impl ReviewStore for InMemoryReviewStore {
    fn add(&self, review: Review) -> ReviewFuture<'_, Review> {
        let reviews = Arc::clone(&self.reviews);
        Box::pin(async move {
            let mut reviews = reviews.lock().map_err(|_| poisoned())?;
            reviews.entry(review.product_id).or_default().push(review.clone());
            Ok(review)
        })
    }

    fn for_product(&self, product: ProductId) -> ReviewFuture<'_, Vec<Review>> {
        let reviews = Arc::clone(&self.reviews);
        Box::pin(async move {
            let reviews = reviews.lock().map_err(|_| poisoned())?;
            Ok(reviews
                .get(&product)
                .map(|list| list.iter().rev().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn summary(&self, product: ProductId) -> ReviewFuture<'_, RatingSummary> {
        let reviews = Arc::clone(&self.reviews);
        Box::pin(async move {
            let reviews = reviews.lock().map_err(|_| poisoned())?;
            let list = reviews.get(&product).map(Vec::as_slice).unwrap_or_default();
            let sum = list.iter().map(|r| u64::from(r.rating.stars())).sum();
            Ok(RatingSummary::from_totals(sum, u64::try_from(list.len()).unwrap_or(u64::MAX)))
        })
    }
}

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    product_id: i64,
    user_id: String,
    reviewer_name: String,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = ShopError;

    fn try_from(row: ReviewRow) -> Result<Self> {
        let rating = u8::try_from(row.rating)
            .ok()
            .filter(|n| (1..=5).contains(n))
            .map(Rating)
            .ok_or_else(|| ShopError::Storage(format!("rating out of range: {}", row.rating)))?;
        Ok(Self {
            id: ReviewId::from_uuid(row.id),
            product_id: crate::db::product_id_from_db(row.product_id)?,
            user_id: UserId::new(row.user_id),
            reviewer_name: row.reviewer_name,
            rating,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

/// Reviews backed by the `reviews` table.
#[derive(Clone)]
pub struct PostgresReviewStore {
    pool: PgPool,
}

impl PostgresReviewStore {
    /// Create a store over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReviewStore for PostgresReviewStore {
    fn add(&self, review: Review) -> ReviewFuture<'_, Review> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO reviews (id, product_id, user_id, reviewer_name, rating, comment, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(review.id.as_uuid())
            .bind(i64::from(review.product_id.value()))
            .bind(review.user_id.as_str())
            .bind(&review.reviewer_name)
            .bind(i16::from(review.rating.stars()))
            .bind(&review.comment)
            .bind(review.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| ShopError::storage("insert review", e))?;
            Ok(review)
        })
    }

    fn for_product(&self, product: ProductId) -> ReviewFuture<'_, Vec<Review>> {
        Box::pin(async move {
            let rows: Vec<ReviewRow> = sqlx::query_as(
                "SELECT id, product_id, user_id, reviewer_name, rating, comment, created_at
                 FROM reviews WHERE product_id = $1 ORDER BY created_at DESC",
            )
            .bind(i64::from(product.value()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ShopError::storage("list reviews", e))?;
            rows.into_iter().map(Review::try_from).collect()
        })
    }

    fn summary(&self, product: ProductId) -> ReviewFuture<'_, RatingSummary> {
        Box::pin(async move {
            let (sum, count): (i64, i64) = sqlx::query_as(
                "SELECT COALESCE(SUM(rating), 0)::BIGINT, COUNT(*) FROM reviews WHERE product_id = $1",
            )
            .bind(i64::from(product.value()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ShopError::storage("summarize reviews", e))?;
            let to_u64 = |v: i64| u64::try_from(v).map_err(|_| ShopError::Storage(format!("negative total: {v}")));
            Ok(RatingSummary::from_totals(to_u64(sum)?, to_u64(count)?))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use storefront_testing::mocks::epoch;

    fn review(product: u32, stars: u8, minutes: i64) -> Review {
        Review {
            id: ReviewId::new(),
            product_id: ProductId::new(product),
            user_id: UserId::new("alice"),
            reviewer_name: "Alice".into(),
            rating: Rating(stars),
            comment: String::new(),
            created_at: epoch() + chrono::Duration::minutes(minutes),
        }
    }

    #[test]
    fn rating_accepts_whole_numbers_in_range() {
        assert_eq!(Rating::from_json(&json!(5)).unwrap().stars(), 5);
        assert_eq!(Rating::from_json(&json!("3")).unwrap().stars(), 3);
        for bad in [json!(0), json!(6), json!(4.5), json!(-1), json!(null), json!("five")] {
            assert!(Rating::from_json(&bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn summary_rounds_to_one_decimal() {
        assert_eq!(RatingSummary::from_totals(0, 0).average, 0.0);
        // 4 + 4 + 5 = 13 / 3 = 4.333..
        assert_eq!(RatingSummary::from_totals(13, 3).average, 4.3);
        assert_eq!(RatingSummary::from_totals(9, 2).average, 4.5);
    }

    #[tokio::test]
    async fn reviews_are_per_product_and_newest_first() {
        let store = InMemoryReviewStore::new();
        store.add(review(1, 4, 0)).await.unwrap();
        store.add(review(1, 5, 1)).await.unwrap();
        store.add(review(2, 1, 2)).await.unwrap();

        let reviews = store.for_product(ProductId::new(1)).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].rating.stars(), 5);

        let summary = store.summary(ProductId::new(1)).await.unwrap();
        assert_eq!(summary.total_reviews, 2);
        assert_eq!(summary.average, 4.5);
    }
}
