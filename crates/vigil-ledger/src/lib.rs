//! # Vigil Ledger
//!
//! The shared, TTL-based health ledger every monitor instance writes to:
//! - Current-status snapshot per provider (`health:{id}`, 1h TTL)
//! - Rolling uptime history (`uptime:{id}`, capped list, 24h TTL)
//! - Detailed check history (`history:{id}`, capped list, 7d TTL)
//! - Circuit-breaker counters (`breaker:{id}` / `breaker_opened:{id}`,
//!   TTL = breaker timeout)
//!
//! The ledger exclusively owns these keys; no other component writes them.
//! Counter updates go through the store's atomic increment so concurrent
//! probes (or multiple monitor processes) cannot lose a threshold crossing.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod ledger;

pub use ledger::{HealthLedger, LedgerConfig};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ledger::{HealthLedger, LedgerConfig};
}
