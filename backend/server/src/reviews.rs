//! # Reviews
//!
//! ## Storage
//! - `reviews:{restaurant id}`: list of review ids, newest at the head
//! - `review_details:{review id}`: hash with id, review, rating, timestamp, restaurantId
//! - Restaurant hash keeps the running `totalStars` and the derived `avgStars`
//!
//! ## Aggregation
//! Adding a review pushes the id, writes the hash and bumps `totalStars`
//! together, then writes `avgStars` to both the restaurant hash and the
//! ranking. The divisor is the list length returned by the push, so it counts
//! exactly the ids pushed so far and needs no second read.
//!
//! Two reviews racing on one restaurant can land their ranking writes out of
//! order. Each write is still a valid average of some prefix of the reviews.
//!
//! Removing a review leaves `totalStars` and `avgStars` untouched. A review
//! recorded under another restaurant is not found from this one, for reads
//! and removals alike.
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, info};

use crate::{
    error::AppError::{self, BadRequest, NotFound},
    guards::{require_restaurant, require_review},
    ids::new_id,
    keys::{restaurant_key, restaurants_by_rating_key, review_details_key, reviews_key},
    models::{FIELD_AVG_STARS, FIELD_RESTAURANT_ID, FIELD_TOTAL_STARS, NewReview, PageQuery, RemovedReview, Review},
    store::{Store, StoreResult},
    utils::{page_window, round1},
};

/// `total / count` to one decimal. `count` is never zero after a push.
pub fn average_stars(total_stars: f64, review_count: u64) -> f64 {
    round1(total_stars / review_count as f64)
}

pub async fn add_review(
    store: &dyn Store,
    restaurant_id: Option<&str>,
    review: NewReview,
) -> Result<Review, AppError> {
    let restaurant_id = require_restaurant(store, restaurant_id).await?;

    let review = Review {
        id: new_id(),
        review: review.review,
        rating: review.rating,
        timestamp: Utc::now().timestamp_millis(),
        restaurant_id: restaurant_id.to_string(),
    };

    let list_key = reviews_key(restaurant_id);
    let details_key = review_details_key(&review.id);
    let restaurant_key = restaurant_key(restaurant_id);
    let fields = review.to_fields();

    let (review_count, details, total_stars) = tokio::join!(
        store.lpush(&list_key, &review.id),
        store.hset(&details_key, &fields),
        store.hincr_float(&restaurant_key, FIELD_TOTAL_STARS, review.rating),
    );

    let review_count = review_count?;
    details?;
    let total_stars = total_stars?;

    let avg_stars = average_stars(total_stars, review_count);
    let ranking_key = restaurants_by_rating_key();
    let avg_field = [(FIELD_AVG_STARS, avg_stars.to_string())];

    let (ranking, average) = tokio::join!(
        store.zadd(&ranking_key, restaurant_id, avg_stars),
        store.hset(&restaurant_key, &avg_field),
    );

    ranking?;
    average?;

    info!(restaurant_id, review_id = %review.id, avg_stars, "Review added");
    Ok(review)
}

/// One page of a restaurant's reviews, newest first.
pub async fn list_reviews(
    store: &dyn Store,
    restaurant_id: Option<&str>,
    query: PageQuery,
    max_limit: u64,
) -> Result<Vec<Review>, AppError> {
    let restaurant_id = require_restaurant(store, restaurant_id).await?;
    let (start, stop) = page_window(query, max_limit)?;

    let ids = store.lrange(&reviews_key(restaurant_id), start, stop).await?;
    let records = join_all(ids.iter().map(|id| load_review(store, id))).await;

    let mut reviews = Vec::with_capacity(records.len());
    for record in records {
        if let Some(review) = record? {
            reviews.push(review);
        }
    }

    Ok(reviews)
}

pub async fn get_review(
    store: &dyn Store,
    restaurant_id: Option<&str>,
    review_id: Option<&str>,
) -> Result<Review, AppError> {
    let restaurant_id = require_restaurant(store, restaurant_id).await?;
    let review_id = require_review(store, review_id).await?;

    load_review(store, review_id)
        .await?
        .filter(|review| review.restaurant_id == restaurant_id)
        .ok_or_else(|| NotFound("Review was not found".into()))
}

/// Drops the id from the restaurant's list and deletes the review hash.
///
/// Succeeds if either step touched something, so repeating a half-applied
/// removal finishes it. Fails with not found only when neither did, or when
/// the hash names a different restaurant.
pub async fn remove_review(
    store: &dyn Store,
    restaurant_id: Option<&str>,
    review_id: Option<&str>,
) -> Result<RemovedReview, AppError> {
    let restaurant_id = require_restaurant(store, restaurant_id).await?;
    let review_id = review_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BadRequest("Review ID not provided".into()))?;

    let list_key = reviews_key(restaurant_id);
    let details_key = review_details_key(review_id);

    let owner = store.hget(&details_key, FIELD_RESTAURANT_ID).await?;
    if owner.is_some_and(|owner| owner != restaurant_id) {
        debug!(restaurant_id, review_id, "Review belongs to another restaurant");
        return Err(NotFound("Review was not found".into()));
    }

    let (removed, deleted) = tokio::join!(store.lrem(&list_key, review_id), store.del(&details_key));
    let removed = removed?;
    let deleted = deleted?;

    if removed == 0 && deleted == 0 {
        return Err(NotFound("Review was not found".into()));
    }

    info!(restaurant_id, review_id, removed, deleted, "Review removed");

    Ok(RemovedReview {
        restaurant_id: restaurant_id.to_string(),
        review_id: review_id.to_string(),
        removed_from_list: removed > 0,
        details_deleted: deleted > 0,
    })
}

async fn load_review(store: &dyn Store, review_id: &str) -> StoreResult<Option<Review>> {
    let key = review_details_key(review_id);
    Review::from_fields(&key, store.hgetall(&key).await?)
}
