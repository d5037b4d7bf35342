//! In-memory state backend implementation

use crate::{Error, Result, StateBackend};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, trace};

/// What a key holds
#[derive(Debug, Clone)]
enum Payload {
    Value(Vec<u8>),
    List(VecDeque<Vec<u8>>),
}

/// Entry in the in-memory store
#[derive(Debug, Clone)]
struct Entry {
    payload: Payload,
    expires_at: Option<Instant>,
}

impl Entry {
    fn value(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            payload: Payload::Value(value),
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn list(ttl: Option<Duration>) -> Self {
        Self {
            payload: Payload::List(VecDeque::new()),
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() > exp)
            .unwrap_or(false)
    }
}

/// In-memory state backend
///
/// Fast, zero dependencies, but single-instance only. Suited to development,
/// testing, and single-node monitor deployments.
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, Entry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Create with background cleanup task
    ///
    /// Spawns a tokio task that periodically removes expired entries.
    pub fn with_cleanup(cleanup_interval: Duration) -> Self {
        let backend = Self::new();
        let store = backend.store.clone();

        tokio::spawn(async move {
            let mut ticker = interval(cleanup_interval);
            loop {
                ticker.tick().await;
                Self::cleanup_expired(&store);
            }
        });

        backend
    }

    /// Manually trigger cleanup of expired entries
    pub fn cleanup(&self) {
        Self::cleanup_expired(&self.store);
    }

    fn cleanup_expired(store: &DashMap<String, Entry>) {
        let mut removed = 0;
        store.retain(|_, entry| {
            if entry.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            debug!(removed, "Cleaned up expired entries");
        }
    }

    /// Get the number of entries in the store
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        trace!(key, "InMemory GET");

        if let Some(entry) = self.store.get(key) {
            if entry.is_expired() {
                drop(entry); // Release read lock
                self.store.remove(key);
                return Ok(None);
            }
            if let Payload::Value(ref value) = entry.payload {
                return Ok(Some(value.clone()));
            }
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        trace!(key, ttl_secs = ?ttl.map(|d| d.as_secs()), "InMemory SET");

        self.store.insert(key.to_string(), Entry::value(value, ttl));

        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64> {
        trace!(key, delta, "InMemory INCRBY");

        let mut new_value = delta;

        // entry() holds the shard lock, so the read-modify-write is atomic
        self.store
            .entry(key.to_string())
            .and_modify(|entry| {
                if !entry.is_expired() {
                    if let Payload::Value(ref value) = entry.payload {
                        if let Ok(current) = std::str::from_utf8(value) {
                            if let Ok(current_num) = current.parse::<i64>() {
                                new_value = current_num + delta;
                                entry.payload =
                                    Payload::Value(new_value.to_string().into_bytes());
                                if let Some(ttl) = ttl {
                                    entry.expires_at = Some(Instant::now() + ttl);
                                }
                                return;
                            }
                        }
                    }
                }

                // Expired or not a counter: restart at delta
                *entry = Entry::value(delta.to_string().into_bytes(), ttl);
            })
            .or_insert_with(|| Entry::value(delta.to_string().into_bytes(), ttl));

        Ok(new_value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        trace!(key, "InMemory DEL");
        self.store.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        trace!(key, ttl_secs = ttl.as_secs(), "InMemory EXPIRE");

        if let Some(mut entry) = self.store.get_mut(key) {
            if !entry.is_expired() {
                entry.expires_at = Some(Instant::now() + ttl);
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn list_push(
        &self,
        key: &str,
        value: Vec<u8>,
        cap: usize,
        ttl: Option<Duration>,
    ) -> Result<usize> {
        trace!(key, cap, "InMemory LPUSH+LTRIM");

        let mut len = 0;
        self.store
            .entry(key.to_string())
            .and_modify(|entry| {
                if entry.is_expired() {
                    *entry = Entry::list(ttl);
                }
                if let Payload::List(ref mut list) = entry.payload {
                    list.push_front(value.clone());
                    list.truncate(cap);
                    len = list.len();
                } else {
                    // Scalar under this key: replace with a fresh list
                    let mut list = VecDeque::new();
                    list.push_front(value.clone());
                    len = 1;
                    entry.payload = Payload::List(list);
                }
                if let Some(ttl) = ttl {
                    entry.expires_at = Some(Instant::now() + ttl);
                }
            })
            .or_insert_with(|| {
                let mut entry = Entry::list(ttl);
                if let Payload::List(ref mut list) = entry.payload {
                    list.push_front(value.clone());
                }
                len = 1;
                entry
            });

        Ok(len)
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>> {
        trace!(key, start, stop, "InMemory LRANGE");

        let Some(entry) = self.store.get(key) else {
            return Ok(Vec::new());
        };
        if entry.is_expired() {
            drop(entry);
            self.store.remove(key);
            return Ok(Vec::new());
        }

        let Payload::List(ref list) = entry.payload else {
            return Ok(Vec::new());
        };

        let len = list.len() as isize;
        let resolve = |idx: isize| -> isize {
            if idx < 0 {
                len + idx
            } else {
                idx
            }
        };
        let start = resolve(start).max(0);
        let stop = resolve(stop).min(len - 1);
        if start > stop || len == 0 {
            return Ok(Vec::new());
        }

        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    async fn list_len(&self, key: &str) -> Result<usize> {
        trace!(key, "InMemory LLEN");

        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                if let Payload::List(ref list) = entry.payload {
                    return Ok(list.len());
                }
            }
        }

        Ok(0)
    }

    async fn list_trim(&self, key: &str, cap: usize) -> Result<usize> {
        trace!(key, cap, "InMemory LTRIM");

        let mut dropped = 0;
        if let Some(mut entry) = self.store.get_mut(key) {
            if !entry.is_expired() {
                if let Payload::List(ref mut list) = entry.payload {
                    if list.len() > cap {
                        dropped = list.len() - cap;
                        list.truncate(cap);
                    }
                }
            }
        }

        Ok(dropped)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        trace!(pattern, "InMemory KEYS");

        // Simple glob pattern matching (* and ?)
        let regex_pattern = regex::escape(pattern).replace(r"\*", ".*").replace(r"\?", ".");

        let re = regex::Regex::new(&format!("^{}$", regex_pattern))
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;

        let keys: Vec<String> = self
            .store
            .iter()
            .filter(|entry| !entry.value().is_expired() && re.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        Ok(keys)
    }

    async fn flush(&self) -> Result<()> {
        debug!("InMemory FLUSH - clearing all keys");
        self.store.clear();
        Ok(())
    }
}
