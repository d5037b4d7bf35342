//! # Vigil Core
//!
//! Shared types and error handling for the Vigil provider health monitor:
//! - Provider configuration records (validated at load time)
//! - Health check records and derived summaries
//! - Monitor settings with serde defaults
//! - The error taxonomy used across all Vigil crates

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod settings;
pub mod types;

pub use error::{Error, Result};
pub use settings::MonitorSettings;
pub use types::{
    AuthType, Category, HealthRecord, HealthSnapshot, HealthSummary, ProviderConfig,
    ProviderHealth, ProviderStatus,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::settings::MonitorSettings;
    pub use crate::types::{
        AuthType, Category, HealthRecord, HealthSnapshot, HealthSummary, ProviderConfig,
        ProviderHealth, ProviderStatus,
    };
}
