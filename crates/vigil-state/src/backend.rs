//! State backend trait definition

use crate::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// State backend trait
///
/// Defines the interface the health ledger stores state through. All
/// operations are async and designed so that multiple monitor instances can
/// share one backend: counter increments are atomic at the store level, and
/// list pushes are append-then-trim (benign over-length between the two
/// steps is tolerated by readers).
#[async_trait]
pub trait StateBackend: Send + Sync + Clone + 'static {
    /// Get a value by key
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Set a value with optional TTL
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Atomic increment operation
    ///
    /// Increments the value at key by delta, creating it at delta if absent.
    /// When a TTL is given, it is refreshed on every increment. Returns the
    /// post-increment value; breaker threshold checks must be made against
    /// this value, never against a separate read.
    async fn increment(&self, key: &str, delta: i64, ttl: Option<Duration>) -> Result<i64>;

    /// Delete a key
    ///
    /// Returns Ok(()) whether the key existed or not.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Set TTL on an existing key
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Push an element onto the head of a list, trim the list to `cap`
    /// elements, and refresh the list's TTL
    ///
    /// Returns the list length after the trim.
    async fn list_push(
        &self,
        key: &str,
        value: Vec<u8>,
        cap: usize,
        ttl: Option<Duration>,
    ) -> Result<usize>;

    /// Read a range of list elements, head first (`stop = -1` for the tail)
    async fn list_range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>>;

    /// Current list length (0 if the key is absent or expired)
    async fn list_len(&self, key: &str) -> Result<usize>;

    /// Trim a list down to `cap` elements, keeping the head
    ///
    /// Returns how many elements were dropped.
    async fn list_trim(&self, key: &str, cap: usize) -> Result<usize>;

    /// List keys matching a glob pattern (use sparingly in production)
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Flush all keys (dangerous - use only in dev/test)
    async fn flush(&self) -> Result<()>;

    /// Health check - verify backend is reachable
    async fn health_check(&self) -> Result<()> {
        let test_key = "__health_check__";
        let test_value = b"ok".to_vec();

        self.set(test_key, test_value.clone(), Some(Duration::from_secs(1)))
            .await?;
        let result = self.get(test_key).await?;
        self.delete(test_key).await?;

        if result == Some(test_value) {
            Ok(())
        } else {
            Err(Error::Backend("Health check failed".to_string()))
        }
    }
}
