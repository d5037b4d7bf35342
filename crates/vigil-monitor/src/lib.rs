//! # Vigil Monitor
//!
//! The monitor service tying the subsystem together:
//! - [`Scheduler`]: runs bounded-concurrency probe cycles on a fixed
//!   interval, feeds results into the ledger, and refreshes metrics on an
//!   independent timer
//! - [`EventBus`]: broadcasts aggregate health changes after every cycle
//! - [`MonitorClient`]: the narrow query facade data-fetching code uses
//!   (`is_healthy`, `failover_chain`, `health_score`)
//! - HTTP API: health, Prometheus metrics, provider status queries, and
//!   on-demand force-checks

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod api;
mod client;
mod events;
mod scheduler;
mod shutdown;

pub use client::MonitorClient;
pub use events::{EventBus, HealthEvent};
pub use scheduler::{CycleSummary, Scheduler};
pub use shutdown::{listen_for_signals, ShutdownSignal};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::build_router;
    pub use crate::client::MonitorClient;
    pub use crate::events::{EventBus, HealthEvent};
    pub use crate::scheduler::{CycleSummary, Scheduler};
    pub use crate::shutdown::{listen_for_signals, ShutdownSignal};
}
