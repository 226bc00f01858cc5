//! Compound writes are not transactions: when one command fails the others
//! still land, nothing is rolled back, and the caller sees a generic failure.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use serde_json::{Value, json};
use server::{
    config::Config,
    error::AppError,
    keys::{cuisine_key, restaurant_key, restaurants_by_rating_key},
    memory::MemoryStore,
    models::{FIELD_AVG_STARS, NewRestaurant, NewReview},
    restaurants::{create_restaurant, get_restaurant},
    reviews::add_review,
    router,
    state::State,
    store::{Store, StoreError, StoreResult},
    weather::{WeatherError, WeatherProvider},
};
use tower::ServiceExt; // for `oneshot`

/// Fails every command whose key contains `poisoned`.
struct FaultyStore {
    inner: MemoryStore,
    poisoned: String,
}

impl FaultyStore {
    fn new(poisoned: &str) -> Self {
        Self {
            inner: MemoryStore::new(),
            poisoned: poisoned.to_string(),
        }
    }

    fn check(&self, key: &str) -> StoreResult<()> {
        if key.contains(&self.poisoned) {
            return Err(StoreError::WrongType { key: key.to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.check(key)?;
        self.inner.exists(key).await
    }

    async fn del(&self, key: &str) -> StoreResult<u64> {
        self.check(key)?;
        self.inner.del(key).await
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        self.check(key)?;
        self.inner.hset(key, fields).await
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.check(key)?;
        self.inner.hget(key, field).await
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.check(key)?;
        self.inner.hgetall(key).await
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        self.check(key)?;
        self.inner.hincr(key, field, delta).await
    }

    async fn hincr_float(&self, key: &str, field: &str, delta: f64) -> StoreResult<f64> {
        self.check(key)?;
        self.inner.hincr_float(key, field, delta).await
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.check(key)?;
        self.inner.sadd(key, member).await
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.check(key)?;
        self.inner.smembers(key).await
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.check(key)?;
        self.inner.zadd(key, member, score).await
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.check(key)?;
        self.inner.zscore(key, member).await
    }

    async fn zrevrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.check(key)?;
        self.inner.zrevrange(key, start, stop).await
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.check(key)?;
        self.inner.lpush(key, value).await
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.check(key)?;
        self.inner.lrange(key, start, stop).await
    }

    async fn lrem(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.check(key)?;
        self.inner.lrem(key, value).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.check(key)?;
        self.inner.set_ex(key, value, ttl).await
    }

    async fn json_get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.check(key)?;
        self.inner.json_get(key).await
    }

    async fn json_set(&self, key: &str, value: &Value) -> StoreResult<()> {
        self.check(key)?;
        self.inner.json_set(key, value).await
    }
}

struct NoWeather;

#[async_trait]
impl WeatherProvider for NoWeather {
    async fn current(&self, _lon: f64, _lat: f64) -> Result<String, WeatherError> {
        Ok("null".to_string())
    }
}

fn cafe() -> NewRestaurant {
    NewRestaurant {
        name: "Cafe A".into(),
        location: "-74,40".into(),
        cuisines: vec!["italian".into(), "pizza".into()],
    }
}

#[tokio::test]
async fn failed_cuisine_index_leaves_restaurant_readable() {
    let store = FaultyStore::new(&cuisine_key("pizza"));

    let result = create_restaurant(&store, cafe()).await;
    assert!(matches!(result, Err(AppError::Store(_))));

    // The hash, ranking entry and the other cuisine all landed.
    let ranked = store.zrevrange(&restaurants_by_rating_key(), 0, -1).await.unwrap();
    assert_eq!(ranked.len(), 1);
    let id = &ranked[0];

    assert_eq!(store.zscore(&restaurants_by_rating_key(), id).await.unwrap(), Some(0.0));
    assert_eq!(store.smembers(&cuisine_key("italian")).await.unwrap(), [id.clone()]);

    let restaurant = get_restaurant(&store, Some(id.as_str())).await.unwrap();
    assert_eq!(restaurant.name, "Cafe A");
    assert_eq!(
        restaurant.cuisines,
        Some(vec!["italian".to_string(), "pizza".to_string()])
    );
}

#[tokio::test]
async fn failed_ranking_write_keeps_hash_average() {
    let store = FaultyStore::new("never-matches");
    let id = create_restaurant(&store, cafe()).await.unwrap();

    let store = FaultyStore {
        inner: store.inner,
        poisoned: restaurants_by_rating_key(),
    };

    let review = NewReview {
        review: "great".into(),
        rating: 5.0,
    };
    assert!(add_review(&store, Some(id.as_str()), review).await.is_err());

    let avg = store.hget(&restaurant_key(&id), FIELD_AVG_STARS).await.unwrap();
    assert_eq!(avg.as_deref(), Some("5"));
    assert_eq!(store.inner.zscore(&restaurants_by_rating_key(), &id).await.unwrap(), Some(0.0));
}

#[tokio::test]
async fn store_failure_surfaces_as_generic_500() {
    let store = Arc::new(FaultyStore::new(&restaurants_by_rating_key()));
    let app: Router = router(State::from_parts(Config::default(), store, Arc::new(NoWeather)));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/restaurants")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "name": "Cafe A", "location": "-74,40", "cuisines": ["italian"] }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "success": false, "error": "Internal Server Error" }));
}
