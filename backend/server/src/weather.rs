//! # Weather
//!
//! Cache-aside lookup in front of the weather provider, keyed per restaurant.
//!
//! 1. `GET weather:{id}`: a hit is returned as is
//! 2. On a miss, read the restaurant's `"lon,lat"` location
//! 3. Fetch from the provider, bounded by the configured timeout
//! 4. `SET weather:{id} <payload> EX ttl`, then return the payload
//!
//! The payload stays the provider's exact body text from fetch to cache to
//! response. It is checked to be JSON but never re-serialized.
//!
//! A failed fetch is returned as upstream unavailable. Nothing stale is served
//! and nothing is retried. Concurrent misses for one restaurant each fetch and
//! each write the cache; the last write wins.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::value::RawValue;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    error::AppError::{self, NotFound, UpstreamUnavailable},
    guards::require_restaurant,
    keys::{restaurant_key, weather_key},
    models::FIELD_LOCATION,
    store::{Store, StoreError},
    utils::parse_location,
};

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Weather request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Weather provider answered {0}")]
    Status(StatusCode),
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Current conditions at a point, as the provider's raw body. The payload
    /// is opaque to the directory.
    async fn current(&self, lon: f64, lat: f64) -> Result<String, WeatherError>;
}

/// OpenWeather's current-conditions endpoint.
pub struct OpenWeatherProvider {
    client: Client,
    url: String,
    api_key: String,
}

impl OpenWeatherProvider {
    pub fn new(url: &str, api_key: &str, timeout: Duration) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn current(&self, lon: f64, lat: f64) -> Result<String, WeatherError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", "imperial".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(WeatherError::Status(response.status()));
        }

        Ok(response.text().await?)
    }
}

pub async fn restaurant_weather(
    store: &dyn Store,
    provider: &dyn WeatherProvider,
    restaurant_id: Option<&str>,
    ttl: Duration,
) -> Result<Box<RawValue>, AppError> {
    let restaurant_id = require_restaurant(store, restaurant_id).await?;
    let cache_key = weather_key(restaurant_id);

    if let Some(cached) = store.get(&cache_key).await? {
        debug!(restaurant_id, "Weather cache hit");
        return Ok(RawValue::from_string(cached).map_err(StoreError::from)?);
    }

    debug!(restaurant_id, "Weather cache miss");

    let (lon, lat) = store
        .hget(&restaurant_key(restaurant_id), FIELD_LOCATION)
        .await?
        .as_deref()
        .and_then(parse_location)
        .ok_or_else(|| NotFound("Coordinates have not been found".into()))?;

    let body = provider.current(lon, lat).await.map_err(|e| {
        warn!(restaurant_id, error = %e, "Weather lookup failed");
        UpstreamUnavailable("Couldn't fetch weather info".into())
    })?;

    let weather = RawValue::from_string(body).map_err(|e| {
        warn!(restaurant_id, error = %e, "Weather provider sent malformed JSON");
        UpstreamUnavailable("Couldn't fetch weather info".into())
    })?;

    store.set_ex(&cache_key, weather.get(), ttl).await?;

    Ok(weather)
}
