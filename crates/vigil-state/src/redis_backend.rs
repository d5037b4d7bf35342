//! Redis state backend implementation

use crate::{Error, Result, StateBackend};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::time::Duration;
use tracing::{debug, trace};

/// Redis state backend
///
/// Distributed and persistent; the backend multiple monitor instances share
/// for high availability. Counter increments map to `INCRBY`, list pushes to
/// a pipelined `LPUSH`+`LTRIM`+`EXPIRE`.
#[derive(Clone)]
pub struct RedisBackend {
    client: ConnectionManager,
    prefix: Option<String>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl RedisBackend {
    /// Create a new Redis backend
    pub async fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Connection(e.to_string()))?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        debug!(url, "Redis backend connected");

        Ok(Self {
            client: connection_manager,
            prefix: None,
        })
    }

    /// Create with key prefix for namespacing
    pub async fn with_prefix(url: &str, prefix: impl Into<String>) -> Result<Self> {
        let mut backend = Self::new(url).await?;
        backend.prefix = Some(prefix.into());
        Ok(backend)
    }

    fn key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    fn unprefix(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => {
                let prefix_with_colon = format!("{}:", prefix);
                key.strip_prefix(&prefix_with_colon)
                    .unwrap_or(key)
                    .to_string()
            }
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl StateBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        trace!(key, "Redis GET");

        let key = self.key(key);
        let mut conn = self.client.clone();

        let result: Option<Vec<u8>> = conn.get(&key).await?;

        Ok(result)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        trace!(key, ttl_secs = ?ttl.map(|d| d.as_secs()), "Redis SET");

        let key = self.key(key);
        let mut conn = self.client.clone();

        if let Some(ttl) = ttl {
            conn.set_ex(&key, value, ttl.as_secs()).await?;
        } else {
            conn.set(&key, value).await?;
        }

        Ok(())
    }

    async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64> {
        trace!(key, delta, "Redis INCRBY");

        let key = self.key(key);
        let mut conn = self.client.clone();

        let new_value: i64 = conn.incr(&key, delta).await?;

        if let Some(ttl) = ttl {
            conn.expire(&key, ttl.as_secs() as i64).await?;
        }

        Ok(new_value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        trace!(key, "Redis DEL");

        let key = self.key(key);
        let mut conn = self.client.clone();

        let _: () = conn.del(&key).await?;

        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        trace!(key, ttl_secs = ttl.as_secs(), "Redis EXPIRE");

        let key = self.key(key);
        let mut conn = self.client.clone();

        let result: bool = conn.expire(&key, ttl.as_secs() as i64).await?;

        Ok(result)
    }

    async fn list_push(
        &self,
        key: &str,
        value: Vec<u8>,
        cap: usize,
        ttl: Option<Duration>,
    ) -> Result<usize> {
        trace!(key, cap, "Redis LPUSH+LTRIM (pipelined)");

        let key = self.key(key);
        let mut conn = self.client.clone();

        let mut pipe = redis::pipe();
        pipe.lpush(&key, value);
        pipe.ltrim(&key, 0, cap as isize - 1);
        if let Some(ttl) = ttl {
            pipe.expire(&key, ttl.as_secs() as i64);
        }
        let _: () = pipe.query_async(&mut conn).await?;

        let len: usize = conn.llen(&key).await?;
        Ok(len)
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>> {
        trace!(key, start, stop, "Redis LRANGE");

        let key = self.key(key);
        let mut conn = self.client.clone();

        let values: Vec<Vec<u8>> = conn.lrange(&key, start, stop).await?;

        Ok(values)
    }

    async fn list_len(&self, key: &str) -> Result<usize> {
        trace!(key, "Redis LLEN");

        let key = self.key(key);
        let mut conn = self.client.clone();

        let len: usize = conn.llen(&key).await?;

        Ok(len)
    }

    async fn list_trim(&self, key: &str, cap: usize) -> Result<usize> {
        trace!(key, cap, "Redis LTRIM");

        let key = self.key(key);
        let mut conn = self.client.clone();

        let before: usize = conn.llen(&key).await?;
        let _: () = conn.ltrim(&key, 0, cap as isize - 1).await?;

        Ok(before.saturating_sub(cap))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        trace!(pattern, "Redis KEYS");

        let pattern = self.key(pattern);
        let mut conn = self.client.clone();

        let keys: Vec<String> = conn.keys(&pattern).await?;

        let keys = keys.into_iter().map(|k| self.unprefix(&k)).collect();

        Ok(keys)
    }

    async fn flush(&self) -> Result<()> {
        debug!("Redis FLUSHDB");

        let mut conn = self.client.clone();

        // With a prefix, delete only our namespace instead of the whole DB
        if let Some(ref prefix) = self.prefix {
            let pattern = format!("{}:*", prefix);
            let keys: Vec<String> = conn.keys(&pattern).await?;
            if !keys.is_empty() {
                let _: () = conn.del(&keys).await?;
            }
        } else {
            let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = self.client.clone();

        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Backend(e.to_string()))?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(Error::Backend("Unexpected PING response".to_string()))
        }
    }
}
