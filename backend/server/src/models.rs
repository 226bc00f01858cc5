//! Records as they are stored and as they are returned.
//!
//! Restaurants and reviews are Redis hashes, so every value arrives as a
//! string; the `from_fields` constructors parse them back into typed records.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::store::{StoreError, StoreResult};

pub const FIELD_ID: &str = "id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_LOCATION: &str = "location";
pub const FIELD_VIEW_COUNT: &str = "viewCount";
pub const FIELD_TOTAL_STARS: &str = "totalStars";
pub const FIELD_AVG_STARS: &str = "avgStars";

pub const FIELD_REVIEW: &str = "review";
pub const FIELD_RATING: &str = "rating";
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_RESTAURANT_ID: &str = "restaurantId";

#[derive(Deserialize, Debug, Clone)]
pub struct NewRestaurant {
    pub name: String,
    pub location: String,
    pub cuisines: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub location: String,
    pub view_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_stars: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_stars: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisines: Option<Vec<String>>,
}

impl Restaurant {
    /// `None` when the hash is empty, i.e. the record does not exist.
    pub fn from_fields(key: &str, mut fields: HashMap<String, String>) -> StoreResult<Option<Self>> {
        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            id: fields.remove(FIELD_ID).unwrap_or_default(),
            name: fields.remove(FIELD_NAME).unwrap_or_default(),
            location: fields.remove(FIELD_LOCATION).unwrap_or_default(),
            view_count: parse_field(key, &fields, FIELD_VIEW_COUNT)?.unwrap_or(0),
            total_stars: parse_field(key, &fields, FIELD_TOTAL_STARS)?,
            avg_stars: parse_field(key, &fields, FIELD_AVG_STARS)?,
            cuisines: None,
        }))
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewReview {
    pub review: String,
    pub rating: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub review: String,
    pub rating: f64,
    pub timestamp: i64,
    pub restaurant_id: String,
}

impl Review {
    pub fn from_fields(key: &str, mut fields: HashMap<String, String>) -> StoreResult<Option<Self>> {
        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(Self {
            id: fields.remove(FIELD_ID).unwrap_or_default(),
            review: fields.remove(FIELD_REVIEW).unwrap_or_default(),
            rating: parse_field(key, &fields, FIELD_RATING)?.unwrap_or(0.0),
            timestamp: parse_field(key, &fields, FIELD_TIMESTAMP)?.unwrap_or(0),
            restaurant_id: fields.remove(FIELD_RESTAURANT_ID).unwrap_or_default(),
        }))
    }

    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_ID, self.id.clone()),
            (FIELD_REVIEW, self.review.clone()),
            (FIELD_RATING, self.rating.to_string()),
            (FIELD_TIMESTAMP, self.timestamp.to_string()),
            (FIELD_RESTAURANT_ID, self.restaurant_id.clone()),
        ]
    }
}

/// What a review removal touched. Both `false` never leaves the engine.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemovedReview {
    pub restaurant_id: String,
    pub review_id: String,
    pub removed_from_list: bool,
    pub details_deleted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Link {
    pub name: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Contact {
    pub phone: String,
    pub email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RestaurantDetails {
    pub links: Vec<Link>,
    pub contact: Contact,
}

#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

fn parse_field<T: std::str::FromStr>(
    key: &str,
    fields: &HashMap<String, String>,
    field: &str,
) -> StoreResult<Option<T>> {
    fields
        .get(field)
        .map(|raw| {
            raw.parse().map_err(|_| StoreError::Parse {
                key: key.to_string(),
                field: field.to_string(),
            })
        })
        .transpose()
}
