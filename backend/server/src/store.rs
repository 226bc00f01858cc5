//! # Store
//!
//! The command set the directory needs from its key-value backend. Each method
//! is one atomic primitive of the backend; anything built from several calls is
//! not atomic as a whole.
//!
//! Implemented by [`RedisStore`](crate::database::RedisStore) in production and
//! [`MemoryStore`](crate::memory::MemoryStore) for tests and local runs.
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation against a key holding the wrong kind of value: {key}")]
    WrongType { key: String },

    #[error("Field {field} of {key} is not a number")]
    Parse { key: String, field: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    async fn del(&self, key: &str) -> StoreResult<u64>;

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()>;

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>>;

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Returns the counter after the increment.
    async fn hincr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64>;

    /// Returns the accumulator after the increment.
    async fn hincr_float(&self, key: &str, field: &str, delta: f64) -> StoreResult<f64>;

    /// `true` when the member was not already present.
    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool>;

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>>;

    /// Members by descending score over the inclusive rank window.
    async fn zrevrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;

    /// Pushes onto the head and returns the list length after insertion.
    async fn lpush(&self, key: &str, value: &str) -> StoreResult<u64>;

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;

    /// Removes every occurrence of `value`, returning how many went.
    async fn lrem(&self, key: &str, value: &str) -> StoreResult<u64>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    async fn json_get(&self, key: &str) -> StoreResult<Option<Value>>;

    async fn json_set(&self, key: &str, value: &Value) -> StoreResult<()>;

    /// Releases backend resources. Later calls may reconnect.
    async fn close(&self) {}
}
