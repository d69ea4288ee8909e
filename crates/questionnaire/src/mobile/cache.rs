use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::survey::domain::{CourseId, GroupId, QuestionnaireId, UserId};

const COMPONENT: &str = "questionnaire";

/// Deterministic key of one cached remote-procedure result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Course listings depend on the caller's enrolment.
    pub fn questionnaires(course: CourseId, user: UserId) -> Self {
        Self(format!("{COMPONENT}:questionnaire:{course}:{user}"))
    }

    pub fn access(questionnaire: QuestionnaireId, user: UserId) -> Self {
        Self(format!("{COMPONENT}:access:{questionnaire}:{user}"))
    }

    /// Group 0 stands for "all participants".
    pub fn analysis(questionnaire: QuestionnaireId, group: Option<GroupId>) -> Self {
        let group = group.map(|group| group.0).unwrap_or(0);
        Self(format!("{COMPONENT}:analysis:{questionnaire}:{group}"))
    }

    /// Prefix matching every analysis entry of a questionnaire.
    pub fn analysis_prefix(questionnaire: QuestionnaireId) -> String {
        format!("{COMPONENT}:analysis:{questionnaire}:")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cached value; `fresh` is false once the entry outlived its time to live.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: Value,
    pub stored_at: DateTime<Utc>,
    pub fresh: bool,
}

/// Key/value store for remote-procedure results.
pub trait WsCache: Send + Sync {
    /// Returns the entry even when expired; callers check `fresh`.
    fn get(&self, key: &CacheKey) -> Option<CacheEntry>;
    fn put(&self, key: &CacheKey, value: Value);
    fn invalidate(&self, key: &CacheKey) -> bool;
    fn invalidate_prefix(&self, prefix: &str) -> usize;
}

#[derive(Debug)]
struct StoredValue {
    value: Value,
    stored_at: DateTime<Utc>,
}

/// Expired entries stay available as a stale fallback for this many TTLs,
/// then the next write drops them.
const STALE_RETENTION: i32 = 10;

/// In-process cache with a fixed time to live.
#[derive(Debug)]
pub struct MemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, StoredValue>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).map(|stored| CacheEntry {
            value: stored.value.clone(),
            stored_at: stored.stored_at,
            fresh: now - stored.stored_at < self.ttl,
        })
    }

    fn put_at(&self, key: &CacheKey, value: Value, now: DateTime<Utc>) {
        let retention = self.ttl * STALE_RETENTION;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, stored| now - stored.stored_at < retention);
        entries.insert(
            key.clone(),
            StoredValue {
                value,
                stored_at: now,
            },
        );
    }
}

impl WsCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entry_at(key, Utc::now())
    }

    fn put(&self, key: &CacheKey, value: Value) {
        self.put_at(key, value, Utc::now());
    }

    fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| !key.as_str().starts_with(prefix));
        before - entries.len()
    }
}

/// Serves a fresh cached value, otherwise fetches and stores the result.
///
/// When the fetch fails, an expired entry is returned instead; the error
/// surfaces only when nothing usable is cached.
pub fn read_through<C, T, E, F>(cache: &C, key: &CacheKey, fetch: F) -> Result<T, E>
where
    C: WsCache + ?Sized,
    T: Serialize + DeserializeOwned,
    E: fmt::Display,
    F: FnOnce() -> Result<T, E>,
{
    let cached = cache.get(key);
    if let Some(entry) = cached.as_ref().filter(|entry| entry.fresh) {
        if let Ok(value) = serde_json::from_value(entry.value.clone()) {
            debug!(key = %key, "cache hit");
            return Ok(value);
        }
    }

    match fetch() {
        Ok(value) => {
            match serde_json::to_value(&value) {
                Ok(json) => cache.put(key, json),
                Err(err) => warn!(key = %key, error = %err, "result not cacheable"),
            }
            Ok(value)
        }
        Err(err) => {
            let stale = cached.and_then(|entry| serde_json::from_value(entry.value).ok());
            match stale {
                Some(value) => {
                    warn!(key = %key, error = %err, "fetch failed, serving cached value");
                    Ok(value)
                }
                None => Err(err),
            }
        }
    }
}
