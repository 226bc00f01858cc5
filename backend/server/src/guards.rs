//! Preconditions run before any read or write that targets one id.
//!
//! Each guard is a single `EXISTS` on the entity's primary key. A missing id
//! is a bad request, an absent key is not found.
use tracing::debug;

use crate::{
    error::AppError::{self, BadRequest, NotFound},
    keys::{restaurant_key, review_details_key},
    store::Store,
};

pub async fn require_restaurant<'a>(
    store: &dyn Store,
    restaurant_id: Option<&'a str>,
) -> Result<&'a str, AppError> {
    let restaurant_id = restaurant_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BadRequest("Restaurant ID not provided".into()))?;

    if !store.exists(&restaurant_key(restaurant_id)).await? {
        debug!(restaurant_id, "Restaurant missing");
        return Err(NotFound("Restaurant not found".into()));
    }

    Ok(restaurant_id)
}

pub async fn require_review<'a>(
    store: &dyn Store,
    review_id: Option<&'a str>,
) -> Result<&'a str, AppError> {
    let review_id = review_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| BadRequest("Review ID not provided".into()))?;

    if !store.exists(&review_details_key(review_id)).await? {
        debug!(review_id, "Review missing");
        return Err(NotFound("Review was not found".into()));
    }

    Ok(review_id)
}
