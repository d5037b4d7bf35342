//! # Vigil State
//!
//! Pluggable TTL-based store backends for the health ledger:
//! - Current-status hashes with fixed TTLs
//! - Capped rolling lists (uptime history, detailed check history)
//! - Atomic circuit-breaker counters
//!
//! ## Backends
//!
//! - **InMemory**: fast, zero dependencies, single-instance only (default)
//! - **Redis**: distributed, shared across monitor instances
//!
//! ## Example
//!
//! ```rust
//! use vigil_state::{StateBackend, InMemoryBackend};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> vigil_state::Result<()> {
//!     let backend = InMemoryBackend::new();
//!
//!     backend.set("health:finnhub", b"healthy".to_vec(), Some(Duration::from_secs(3600))).await?;
//!     let count = backend.increment("breaker:finnhub", 1, Some(Duration::from_secs(300))).await?;
//!     assert_eq!(count, 1);
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod backend;
mod config;
mod error;
mod inmemory;

#[cfg(feature = "redis-backend")]
mod redis_backend;

pub use backend::StateBackend;
pub use config::BackendConfig;
pub use error::{Error, Result};
pub use inmemory::InMemoryBackend;

#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisBackend;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::backend::StateBackend;
    pub use crate::config::BackendConfig;
    pub use crate::error::{Error, Result};
    pub use crate::inmemory::InMemoryBackend;

    #[cfg(feature = "redis-backend")]
    pub use crate::redis_backend::RedisBackend;
}
