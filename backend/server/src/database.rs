//! # Redis
//!
//! RAM database holding every restaurant, review, cuisine index, the rating
//! ranking and the weather cache.
//!
//! ## Connection
//!
//! - One `ConnectionManager` per process, created on the first command
//! - Creation happens behind a lock so concurrent first requests share one attempt
//! - A failed attempt is returned to the request that triggered it; the next request tries again
//! - The manager multiplexes, so clones are handed out per command and nothing is serialized
//!
//! ## Atomicity
//!
//! Each method maps to one Redis command. Redis queues commands, so a single
//! increment or set-add is atomic; sequences of them are not.
use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::info;

use crate::store::{Store, StoreResult};

pub struct RedisStore {
    client: Client,
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisStore {
    /// Parses the URL only. The connection is opened by the first command.
    pub fn open(redis_url: &str) -> StoreResult<Self> {
        Ok(Self {
            client: Client::open(redis_url)?,
            connection: Mutex::new(None),
        })
    }

    async fn connection(&self) -> StoreResult<ConnectionManager> {
        let mut slot = self.connection.lock().await;

        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(500));

        let connection = self
            .client
            .get_connection_manager_with_config(config)
            .await?;
        info!("Redis connection established");

        *slot = Some(connection.clone());
        Ok(connection)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.connection().await?.exists(key).await?)
    }

    async fn del(&self, key: &str) -> StoreResult<u64> {
        Ok(self.connection().await?.del(key).await?)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let _: () = self.connection().await?.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        Ok(self.connection().await?.hget(key, field).await?)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        Ok(self.connection().await?.hgetall(key).await?)
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        Ok(self.connection().await?.hincr(key, field, delta).await?)
    }

    async fn hincr_float(&self, key: &str, field: &str, delta: f64) -> StoreResult<f64> {
        // f64 deltas are sent as HINCRBYFLOAT
        Ok(self.connection().await?.hincr(key, field, delta).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        let added: u64 = self.connection().await?.sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        Ok(self.connection().await?.smembers(key).await?)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let _: u64 = self.connection().await?.zadd(key, member, score).await?;
        Ok(())
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        Ok(self.connection().await?.zscore(key, member).await?)
    }

    async fn zrevrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        Ok(self.connection().await?.zrevrange(key, start, stop).await?)
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<u64> {
        Ok(self.connection().await?.lpush(key, value).await?)
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        Ok(self.connection().await?.lrange(key, start, stop).await?)
    }

    async fn lrem(&self, key: &str, value: &str) -> StoreResult<u64> {
        // count 0 removes every occurrence
        Ok(self.connection().await?.lrem(key, 0, value).await?)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.connection().await?.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let seconds = ttl.as_secs().max(1);
        let _: () = self.connection().await?.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn json_get(&self, key: &str) -> StoreResult<Option<Value>> {
        let mut connection = self.connection().await?;
        let raw: Option<String> = redis::cmd("JSON.GET")
            .arg(key)
            .query_async(&mut connection)
            .await?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    async fn json_set(&self, key: &str, value: &Value) -> StoreResult<()> {
        let mut connection = self.connection().await?;
        let _: () = redis::cmd("JSON.SET")
            .arg(key)
            .arg("$")
            .arg(serde_json::to_string(value)?)
            .query_async(&mut connection)
            .await?;

        Ok(())
    }

    async fn close(&self) {
        if self.connection.lock().await.take().is_some() {
            info!("Redis connection released");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ids::new_id;

    #[test]
    fn rejects_malformed_url_up_front() {
        assert!(RedisStore::open("not a url").is_err());
    }

    #[tokio::test]
    async fn surfaces_connection_failure_to_the_caller() {
        // Port 1 is never a Redis server.
        let store = RedisStore::open("redis://127.0.0.1:1").unwrap();

        assert!(store.exists("anything").await.is_err());
        assert!(store.connection.lock().await.is_none());
    }

    /// `cargo test -- --ignored` with Redis Stack on `REDIS_URL` (default local).
    #[tokio::test]
    #[ignore = "needs a live Redis Stack"]
    async fn commands_round_trip_against_live_redis() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let store = RedisStore::open(&url).unwrap();
        let scope = new_id();
        let key = |kind: &str| format!("test:{scope}:{kind}");

        let hash = key("hash");
        store.hset(&hash, &[("name", "Cafe A".to_string())]).await.unwrap();
        assert_eq!(store.hget(&hash, "name").await.unwrap().as_deref(), Some("Cafe A"));
        assert_eq!(store.hincr(&hash, "views", 1).await.unwrap(), 1);
        assert_eq!(store.hincr_float(&hash, "stars", 2.5).await.unwrap(), 2.5);
        assert_eq!(store.hincr_float(&hash, "stars", 1.5).await.unwrap(), 4.0);

        let list = key("list");
        assert_eq!(store.lpush(&list, "a").await.unwrap(), 1);
        assert_eq!(store.lpush(&list, "a").await.unwrap(), 2);
        assert_eq!(store.lrem(&list, "a").await.unwrap(), 2);
        assert!(!store.exists(&list).await.unwrap());

        let ranking = key("ranking");
        store.zadd(&ranking, "low", 1.0).await.unwrap();
        store.zadd(&ranking, "high", 4.5).await.unwrap();
        assert_eq!(store.zrevrange(&ranking, 0, -1).await.unwrap(), ["high", "low"]);
        assert_eq!(store.zscore(&ranking, "high").await.unwrap(), Some(4.5));

        // Sub-second TTLs are stored as one second.
        let cached = key("cached");
        store.set_ex(&cached, "payload", Duration::from_millis(400)).await.unwrap();
        assert_eq!(store.get(&cached).await.unwrap().as_deref(), Some("payload"));

        let document = key("document");
        let details = json!({ "links": [], "contact": { "phone": "555-0100", "email": "a@b.c" } });
        store.json_set(&document, &details).await.unwrap();
        assert_eq!(store.json_get(&document).await.unwrap(), Some(details));
        assert_eq!(store.json_get(&key("absent")).await.unwrap(), None);

        for kind in ["hash", "ranking", "cached", "document"] {
            store.del(&key(kind)).await.unwrap();
        }
        store.close().await;
    }
}
