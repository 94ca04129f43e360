//! Product review endpoints.

use super::{non_blank, product_id_from_path};
use crate::auth::AuthUser;
use crate::error::ShopError;
use crate::reviews::{Rating, Review};
use crate::server::state::AppState;
use crate::types::ReviewId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use storefront_web::WebResult;

/// `POST /product/:id/review` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewRequest {
    /// 1 to 5, as a number or numeric string
    pub rating: serde_json::Value,
    /// Optional text
    pub comment: Option<String>,
}

/// A single review.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    /// Always true
    pub success: bool,
    /// The stored review
    pub review: Review,
}

/// Reviews of a product.
#[derive(Debug, Serialize)]
pub struct ReviewListResponse {
    /// Always true
    pub success: bool,
    /// Newest first
    pub reviews: Vec<Review>,
}

/// Average rating of a product.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageRatingResponse {
    /// Always true
    pub success: bool,
    /// Mean stars to one decimal
    pub average: f64,
    /// Number of reviews
    pub total_reviews: u64,
}

/// Review a product as the caller.
pub async fn add_review(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> WebResult<(StatusCode, Json<ReviewResponse>)> {
    let product_id = product_id_from_path(&id)?;
    let rating = Rating::from_json(&request.rating)?;
    if state.ledger.product(product_id).await?.is_none() {
        return Err(ShopError::not_found("Product not found").into());
    }

    let review = Review {
        id: ReviewId::new(),
        product_id,
        user_id: identity.user_id.clone(),
        reviewer_name: identity.display_name().to_string(),
        rating,
        comment: non_blank(request.comment).unwrap_or_default(),
        created_at: state.clock.now(),
    };
    let review = state.reviews.add(review).await?;
    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse {
            success: true,
            review,
        }),
    ))
}

/// Reviews of a product, newest first.
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<ReviewListResponse>> {
    let product_id = product_id_from_path(&id)?;
    let reviews = state.reviews.for_product(product_id).await?;
    Ok(Json(ReviewListResponse {
        success: true,
        reviews,
    }))
}

/// Average rating, `0` without reviews.
pub async fn average_rating(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Json<AverageRatingResponse>> {
    let product_id = product_id_from_path(&id)?;
    let summary = state.reviews.summary(product_id).await?;
    Ok(Json(AverageRatingResponse {
        success: true,
        average: summary.average,
        total_reviews: summary.total_reviews,
    }))
}
