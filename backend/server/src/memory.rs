//! In-process [`Store`] with Redis semantics for the commands the directory uses.
//!
//! Backs the test suites and `REDIS_URL=memory://` local runs. String expiry
//! uses `tokio::time::Instant`, so paused-clock tests can step past a TTL.
//! Expiry is lazy: a key is only checked when a command touches it.
use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::store::{Store, StoreError, StoreResult};

enum Entry {
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    SortedSet(HashMap<String, f64>),
    List(VecDeque<String>),
    Text {
        value: String,
        expires_at: Option<Instant>,
    },
    Json(Value),
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self, Entry::Text { expires_at: Some(at), .. } if *at <= now)
    }

    /// Redis drops collections once their last element goes.
    fn is_empty(&self) -> bool {
        match self {
            Entry::Hash(map) => map.is_empty(),
            Entry::Set(set) => set.is_empty(),
            Entry::SortedSet(set) => set.is_empty(),
            Entry::List(list) => list.is_empty(),
            Entry::Text { .. } | Entry::Json(_) => false,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one command against `key`. An expired value is dropped before the
    /// command sees it, and a collection left empty is dropped after.
    fn with_key<T>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if entries.get(key).is_some_and(|entry| entry.is_expired(Instant::now())) {
            entries.remove(key);
        }

        let result = f(&mut entries);

        if entries.get(key).is_some_and(Entry::is_empty) {
            entries.remove(key);
        }

        result
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType { key: key.to_string() }
}

fn hash_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> StoreResult<&'a mut HashMap<String, String>> {
    match entries
        .entry(key.to_string())
        .or_insert_with(|| Entry::Hash(HashMap::new()))
    {
        Entry::Hash(map) => Ok(map),
        _ => Err(wrong_type(key)),
    }
}

fn set_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> StoreResult<&'a mut BTreeSet<String>> {
    match entries
        .entry(key.to_string())
        .or_insert_with(|| Entry::Set(BTreeSet::new()))
    {
        Entry::Set(set) => Ok(set),
        _ => Err(wrong_type(key)),
    }
}

fn list_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> StoreResult<&'a mut VecDeque<String>> {
    match entries
        .entry(key.to_string())
        .or_insert_with(|| Entry::List(VecDeque::new()))
    {
        Entry::List(list) => Ok(list),
        _ => Err(wrong_type(key)),
    }
}

/// Clamps an inclusive Redis rank window (negative = from the end) to `len`.
fn rank_window(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len {
        return None;
    }

    Some((start as usize, stop as usize))
}

fn parse_number<T: std::str::FromStr>(key: &str, field: &str, raw: &str) -> StoreResult<T> {
    raw.parse().map_err(|_| StoreError::Parse {
        key: key.to_string(),
        field: field.to_string(),
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.with_key(key, |entries| entries.contains_key(key)))
    }

    async fn del(&self, key: &str) -> StoreResult<u64> {
        Ok(self.with_key(key, |entries| u64::from(entries.remove(key).is_some())))
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> StoreResult<()> {
        self.with_key(key, |entries| {
            let map = hash_mut(entries, key)?;
            for (field, value) in fields {
                map.insert(field.to_string(), value.clone());
            }
            Ok(())
        })
    }

    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        self.with_key(key, |entries| match entries.get(key) {
            None => Ok(None),
            Some(Entry::Hash(map)) => Ok(map.get(field).cloned()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.with_key(key, |entries| match entries.get(key) {
            None => Ok(HashMap::new()),
            Some(Entry::Hash(map)) => Ok(map.clone()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        self.with_key(key, |entries| {
            let map = hash_mut(entries, key)?;
            let current: i64 = match map.get(field) {
                Some(raw) => parse_number(key, field, raw)?,
                None => 0,
            };

            let next = current + delta;
            map.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn hincr_float(&self, key: &str, field: &str, delta: f64) -> StoreResult<f64> {
        self.with_key(key, |entries| {
            let map = hash_mut(entries, key)?;
            let current: f64 = match map.get(field) {
                Some(raw) => parse_number(key, field, raw)?,
                None => 0.0,
            };

            let next = current + delta;
            map.insert(field.to_string(), next.to_string());
            Ok(next)
        })
    }

    async fn sadd(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.with_key(key, |entries| Ok(set_mut(entries, key)?.insert(member.to_string())))
    }

    async fn smembers(&self, key: &str) -> StoreResult<Vec<String>> {
        self.with_key(key, |entries| match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.with_key(key, |entries| {
            match entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::SortedSet(HashMap::new()))
            {
                Entry::SortedSet(set) => {
                    set.insert(member.to_string(), score);
                    Ok(())
                }
                _ => Err(wrong_type(key)),
            }
        })
    }

    async fn zscore(&self, key: &str, member: &str) -> StoreResult<Option<f64>> {
        self.with_key(key, |entries| match entries.get(key) {
            None => Ok(None),
            Some(Entry::SortedSet(set)) => Ok(set.get(member).copied()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn zrevrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.with_key(key, |entries| {
            let set = match entries.get(key) {
                None => return Ok(Vec::new()),
                Some(Entry::SortedSet(set)) => set,
                Some(_) => return Err(wrong_type(key)),
            };

            // Reverse of Redis' ascending (score, member) order.
            let mut ranked: Vec<(&String, f64)> = set.iter().map(|(m, s)| (m, *s)).collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(a.0)));

            Ok(match rank_window(ranked.len(), start, stop) {
                Some((from, to)) => ranked[from..=to]
                    .iter()
                    .map(|(member, _)| member.to_string())
                    .collect(),
                None => Vec::new(),
            })
        })
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.with_key(key, |entries| {
            let list = list_mut(entries, key)?;
            list.push_front(value.to_string());
            Ok(list.len() as u64)
        })
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.with_key(key, |entries| {
            let list = match entries.get(key) {
                None => return Ok(Vec::new()),
                Some(Entry::List(list)) => list,
                Some(_) => return Err(wrong_type(key)),
            };

            Ok(match rank_window(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            })
        })
    }

    async fn lrem(&self, key: &str, value: &str) -> StoreResult<u64> {
        self.with_key(key, |entries| match entries.get_mut(key) {
            None => Ok(0),
            Some(Entry::List(list)) => {
                let before = list.len();
                list.retain(|item| item != value);
                Ok((before - list.len()) as u64)
            }
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_key(key, |entries| match entries.get(key) {
            None => Ok(None),
            Some(Entry::Text { value, .. }) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.with_key(key, |entries| {
            entries.insert(
                key.to_string(),
                Entry::Text {
                    value: value.to_string(),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            Ok(())
        })
    }

    async fn json_get(&self, key: &str) -> StoreResult<Option<Value>> {
        self.with_key(key, |entries| match entries.get(key) {
            None => Ok(None),
            Some(Entry::Json(value)) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn json_set(&self, key: &str, value: &Value) -> StoreResult<()> {
        self.with_key(key, |entries| {
            if matches!(entries.get(key), Some(entry) if !matches!(entry, Entry::Json(_))) {
                return Err(wrong_type(key));
            }

            entries.insert(key.to_string(), Entry::Json(value.clone()));
            Ok(())
        })
    }
}
