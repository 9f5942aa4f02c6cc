use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::{
    dto::reviews::{CreateReviewRequest, ReviewList},
    entity::{
        Products,
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Review,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub const RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=5;

pub async fn list_reviews(state: &AppState, product_id: i32) -> AppResult<ApiResponse<ReviewList>> {
    ensure_product(state, product_id).await?;

    let items: Vec<Review> = Reviews::find()
        .filter(ReviewCol::ProductId.eq(product_id))
        .order_by_desc(ReviewCol::CreatedAt)
        .order_by_desc(ReviewCol::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Review::from)
        .collect();

    let meta = Meta::single_page(items.len());
    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items },
        Some(meta),
    ))
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    product_id: i32,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    if !RATING_RANGE.contains(&payload.rating) {
        return Err(AppError::validation("rating must be between 1 and 5."));
    }
    ensure_product(state, product_id).await?;

    let comment = payload
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let review = ReviewActive {
        id: NotSet,
        product_id: Set(product_id),
        user_id: Set(user.user_id),
        rating: Set(payload.rating),
        comment: Set(comment),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(review_id = review.id, product_id, rating = review.rating, "review created");

    Ok(ApiResponse::success(
        "Review created",
        Review::from(review),
        Some(Meta::empty()),
    ))
}

async fn ensure_product(state: &AppState, product_id: i32) -> AppResult<()> {
    Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .map(|_| ())
        .ok_or(AppError::ProductNotFound(product_id))
}
