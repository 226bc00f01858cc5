use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State as AxumState,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Value, json, value::RawValue};

use crate::{
    cuisines,
    error::{AppError, ErrorBody},
    models::{NewRestaurant, NewReview, PageQuery, RemovedReview, Restaurant, RestaurantDetails, Review},
    response::Success,
    restaurants, reviews,
    state::State,
    utils::{validate_details, validate_restaurant, validate_review},
    weather,
};

type AppState = AxumState<Arc<State>>;
type SegmentPath = Result<Path<String>, PathRejection>;
type ReviewPath = Result<Path<(String, String)>, PathRejection>;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn path<T>(segments: Result<Path<T>, PathRejection>) -> Result<T, AppError> {
    segments
        .map(|Path(segments)| segments)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn page(query: Result<Query<PageQuery>, QueryRejection>) -> Result<PageQuery, AppError> {
    query
        .map(|Query(page)| page)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

pub async fn list_restaurants_handler(
    AxumState(state): AppState,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Success<Vec<Restaurant>>, AppError> {
    let restaurants =
        restaurants::list_restaurants(state.store.as_ref(), page(query)?, state.config.max_page_limit)
            .await?;

    Ok(Success::ok(restaurants))
}

pub async fn create_restaurant_handler(
    AxumState(state): AppState,
    payload: Result<Json<NewRestaurant>, JsonRejection>,
) -> Result<Success<Value>, AppError> {
    let restaurant = validate_restaurant(body(payload)?)?;
    let id = restaurants::create_restaurant(state.store.as_ref(), restaurant).await?;

    Ok(Success::created(json!({ "id": id }), "Added new restaurant"))
}

pub async fn get_restaurant_handler(
    AxumState(state): AppState,
    restaurant_id: SegmentPath,
) -> Result<Success<Restaurant>, AppError> {
    let restaurant_id = path(restaurant_id)?;
    let restaurant = restaurants::get_restaurant(state.store.as_ref(), Some(restaurant_id.as_str())).await?;

    Ok(Success::ok(restaurant))
}

pub async fn set_details_handler(
    AxumState(state): AppState,
    restaurant_id: SegmentPath,
    payload: Result<Json<RestaurantDetails>, JsonRejection>,
) -> Result<Success<RestaurantDetails>, AppError> {
    let restaurant_id = path(restaurant_id)?;
    let details = body(payload)?;
    validate_details(&details)?;

    restaurants::set_details(state.store.as_ref(), Some(restaurant_id.as_str()), &details).await?;

    Ok(Success::created(details, "Restaurant details added"))
}

pub async fn get_details_handler(
    AxumState(state): AppState,
    restaurant_id: SegmentPath,
) -> Result<Success<RestaurantDetails>, AppError> {
    let restaurant_id = path(restaurant_id)?;
    let details = restaurants::get_details(state.store.as_ref(), Some(restaurant_id.as_str())).await?;

    Ok(Success::ok(details))
}

pub async fn weather_handler(
    AxumState(state): AppState,
    restaurant_id: SegmentPath,
) -> Result<Success<Box<RawValue>>, AppError> {
    let restaurant_id = path(restaurant_id)?;
    let weather = weather::restaurant_weather(
        state.store.as_ref(),
        state.weather.as_ref(),
        Some(restaurant_id.as_str()),
        state.config.weather_ttl,
    )
    .await?;

    Ok(Success::ok(weather))
}

pub async fn add_review_handler(
    AxumState(state): AppState,
    restaurant_id: SegmentPath,
    payload: Result<Json<NewReview>, JsonRejection>,
) -> Result<Success<Review>, AppError> {
    let restaurant_id = path(restaurant_id)?;
    let review = validate_review(body(payload)?)?;
    let review = reviews::add_review(state.store.as_ref(), Some(restaurant_id.as_str()), review).await?;

    Ok(Success::created(review, "Review added"))
}

pub async fn list_reviews_handler(
    AxumState(state): AppState,
    restaurant_id: SegmentPath,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Success<Vec<Review>>, AppError> {
    let restaurant_id = path(restaurant_id)?;
    let reviews = reviews::list_reviews(
        state.store.as_ref(),
        Some(restaurant_id.as_str()),
        page(query)?,
        state.config.max_page_limit,
    )
    .await?;

    Ok(Success::ok(reviews))
}

pub async fn get_review_handler(
    AxumState(state): AppState,
    ids: ReviewPath,
) -> Result<Success<Review>, AppError> {
    let (restaurant_id, review_id) = path(ids)?;
    let review = reviews::get_review(
        state.store.as_ref(),
        Some(restaurant_id.as_str()),
        Some(review_id.as_str()),
    )
    .await?;

    Ok(Success::ok(review))
}

pub async fn remove_review_handler(
    AxumState(state): AppState,
    ids: ReviewPath,
) -> Result<Success<RemovedReview>, AppError> {
    let (restaurant_id, review_id) = path(ids)?;
    let removed = reviews::remove_review(
        state.store.as_ref(),
        Some(restaurant_id.as_str()),
        Some(review_id.as_str()),
    )
    .await?;

    Ok(Success::ok(removed).with_message("Review deleted"))
}

pub async fn list_cuisines_handler(
    AxumState(state): AppState,
) -> Result<Success<Vec<String>>, AppError> {
    Ok(Success::ok(cuisines::list_cuisines(state.store.as_ref()).await?))
}

pub async fn cuisine_handler(
    AxumState(state): AppState,
    cuisine: SegmentPath,
) -> Result<Success<Vec<String>>, AppError> {
    let cuisine = path(cuisine)?;
    let restaurants = cuisines::restaurants_by_cuisine(state.store.as_ref(), &cuisine).await?;

    Ok(Success::ok(restaurants))
}

pub async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Not Found")))
}

pub async fn method_not_allowed_handler() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, Json(ErrorBody::new("Method Not Allowed")))
}
