//! # Vigil Probe
//!
//! Executes one health check against one provider:
//! - Consults the circuit breaker first; open breakers short-circuit the
//!   probe with no network call
//! - Resolves credentials from the environment and attaches them per the
//!   provider's auth type (or substitutes an `{api_key}` URL placeholder)
//! - Retries connection and timeout failures with exponential backoff;
//!   HTTP error statuses are never retried
//! - Validates 200 bodies against the provider's category
//!
//! Every code path produces a [`vigil_core::HealthRecord`]; the prober never
//! returns an error to its caller.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod gate;
mod prober;
mod validate;

pub use gate::BreakerGate;
pub use prober::{ProbeConfig, Prober};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::gate::BreakerGate;
    pub use crate::prober::{ProbeConfig, Prober};
}
