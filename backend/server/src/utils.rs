use std::collections::BTreeSet;

use crate::{
    error::AppError::{self, BadRequest},
    models::{NewRestaurant, NewReview, PageQuery, RestaurantDetails},
};

pub const MIN_RATING: f64 = 1.0;
pub const MAX_RATING: f64 = 5.0;
pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

/// Rounds to one decimal place, halves away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Splits a `"lon,lat"` location into `(lon, lat)`.
pub fn parse_location(location: &str) -> Option<(f64, f64)> {
    let (lon, lat) = location.split_once(',')?;

    let lon: f64 = lon.trim().parse().ok()?;
    let lat: f64 = lat.trim().parse().ok()?;

    (lon.is_finite() && lat.is_finite()).then_some((lon, lat))
}

/// Inclusive `(start, stop)` rank window for a page.
pub fn page_window(query: PageQuery, max_limit: u64) -> Result<(isize, isize), AppError> {
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);

    if page == 0 {
        return Err(BadRequest("page must be at least 1".into()));
    }

    if limit == 0 || limit > max_limit {
        return Err(BadRequest(format!("limit must be between 1 and {max_limit}")));
    }

    (page - 1)
        .checked_mul(limit)
        .and_then(|start| {
            let stop = start.checked_add(limit - 1)?;
            Some((isize::try_from(start).ok()?, isize::try_from(stop).ok()?))
        })
        .ok_or_else(|| BadRequest("page is out of range".into()))
}

pub fn validate_restaurant(payload: NewRestaurant) -> Result<NewRestaurant, AppError> {
    let name = payload.name.trim().to_string();
    let location = payload.location.trim().to_string();

    if name.is_empty() {
        return Err(BadRequest("name must not be empty".into()));
    }

    if parse_location(&location).is_none() {
        return Err(BadRequest("location must be \"lon,lat\"".into()));
    }

    let cuisines: BTreeSet<String> = payload
        .cuisines
        .iter()
        .map(|cuisine| cuisine.trim().to_lowercase())
        .collect();

    if cuisines.is_empty() || cuisines.contains("") {
        return Err(BadRequest("cuisines must be a non-empty list of names".into()));
    }

    Ok(NewRestaurant {
        name,
        location,
        cuisines: cuisines.into_iter().collect(),
    })
}

pub fn validate_review(payload: NewReview) -> Result<NewReview, AppError> {
    let review = payload.review.trim().to_string();

    if review.is_empty() {
        return Err(BadRequest("review must not be empty".into()));
    }

    if !(MIN_RATING..=MAX_RATING).contains(&payload.rating) {
        return Err(BadRequest(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }

    Ok(NewReview {
        review,
        rating: payload.rating,
    })
}

pub fn validate_details(details: &RestaurantDetails) -> Result<(), AppError> {
    for link in &details.links {
        if link.name.trim().is_empty() || link.url.trim().is_empty() {
            return Err(BadRequest("links need a name and a url".into()));
        }
    }

    if details.contact.phone.trim().is_empty() {
        return Err(BadRequest("contact phone must not be empty".into()));
    }

    if !details.contact.email.contains('@') {
        return Err(BadRequest("contact email is invalid".into()));
    }

    Ok(())
}
