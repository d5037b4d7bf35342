//! Configuration for state backends

use serde::{Deserialize, Serialize};

/// Backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-memory backend (default, single-instance only)
    #[default]
    Memory,

    /// Redis backend (distributed, shared across monitor instances)
    Redis {
        /// Redis connection URL (redis://host:port or rediss:// for TLS)
        url: String,

        /// Key prefix for namespacing
        #[serde(default)]
        prefix: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_memory() {
        assert_eq!(BackendConfig::default(), BackendConfig::Memory);
    }

    #[test]
    fn test_deserialize_redis() {
        let json = r#"{"type": "redis", "url": "redis://127.0.0.1:6379", "prefix": "vigil"}"#;
        let config: BackendConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config,
            BackendConfig::Redis {
                url: "redis://127.0.0.1:6379".to_string(),
                prefix: Some("vigil".to_string()),
            }
        );
    }
}
