//! # Vigil Registry
//!
//! Provider registry management:
//! - Loads a declarative document grouping providers by `*_providers` keys
//! - Validates entries against the `ProviderConfig` schema, skipping bad ones
//! - Hot-reloads when the source file's modification time advances
//! - Answers filtered/sorted queries and builds failover chains

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod credentials;
pub mod loader;
pub mod registry;

pub use loader::{load_document, RegistryDocument};
pub use registry::{ListFilter, ProviderRegistry};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::credentials::{is_available, resolve_credential};
    pub use crate::loader::{load_document, RegistryDocument};
    pub use crate::registry::{ListFilter, ProviderRegistry};
}
