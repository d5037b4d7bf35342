//! Registry document loading
//!
//! The registry source is a YAML (or JSON) document whose top-level keys
//! ending in `_providers` each map provider ids to entries:
//!
//! ```yaml
//! stock_providers:
//!   finnhub:
//!     name: "Finnhub"
//!     base_url: "https://finnhub.io/api/v1"
//!     health_endpoint: "/quote?symbol=AAPL&token={api_key}"
//!     category: stock
//!     required_env_keys: [FINNHUB_API_KEY]
//! backup_providers:
//!   ...
//! monitor:
//!   check_interval: "60s"
//! state:
//!   type: memory
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};
use vigil_core::{Error, MonitorSettings, ProviderConfig, Result};
use vigil_state::BackendConfig;

/// Everything parsed out of one registry source file
#[derive(Debug, Clone)]
pub struct RegistryDocument {
    /// Validated providers, keyed by id
    pub providers: HashMap<String, ProviderConfig>,
    /// Monitor tunables from the optional `monitor` section
    pub settings: MonitorSettings,
    /// Store backend selection from the optional `state` section
    pub backend: BackendConfig,
    /// How many entries failed validation and were skipped
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    monitor: Option<MonitorSettings>,
    #[serde(default)]
    state: Option<BackendConfig>,
    #[serde(flatten)]
    rest: HashMap<String, serde_yaml::Value>,
}

/// Load and validate a registry document from a file
///
/// Entries that fail schema validation are skipped with a warning; the load
/// only fails when the document cannot be parsed at all or validates zero
/// providers.
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<RegistryDocument> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read registry source: {e}")))?;

    load_from_str(&content)
}

/// Load and validate a registry document from a string
pub fn load_from_str(content: &str) -> Result<RegistryDocument> {
    // serde_yaml parses JSON documents too
    let raw: RawDocument = serde_yaml::from_str(content)
        .map_err(|e| Error::Config(format!("Failed to parse registry document: {e}")))?;

    let settings = raw.monitor.unwrap_or_default();
    settings.validate()?;
    let backend = raw.state.unwrap_or_default();

    let mut providers: HashMap<String, ProviderConfig> = HashMap::new();
    let mut skipped = 0;

    for (group, value) in &raw.rest {
        if !group.ends_with("_providers") {
            debug!(group, "Ignoring non-provider top-level key");
            continue;
        }

        let entries: HashMap<String, serde_yaml::Value> = match serde_yaml::from_value(value.clone())
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(group, error = %e, "Provider group is not a map, skipping");
                skipped += 1;
                continue;
            }
        };

        for (key, entry) in entries {
            match parse_entry(&key, entry) {
                Ok(provider) => {
                    if providers.contains_key(&provider.id) {
                        warn!(
                            id = %provider.id,
                            group,
                            "Duplicate provider id, keeping the first occurrence"
                        );
                        skipped += 1;
                        continue;
                    }
                    debug!(id = %provider.id, group, category = %provider.category, "Provider loaded");
                    providers.insert(provider.id.clone(), provider);
                }
                Err(e) => {
                    warn!(id = %key, group, error = %e, "Skipping invalid provider entry");
                    skipped += 1;
                }
            }
        }
    }

    if providers.is_empty() {
        return Err(Error::EmptyRegistry);
    }

    Ok(RegistryDocument {
        providers,
        settings,
        backend,
        skipped,
    })
}

fn parse_entry(key: &str, entry: serde_yaml::Value) -> Result<ProviderConfig> {
    let mut provider: ProviderConfig = serde_yaml::from_value(entry)
        .map_err(|e| Error::invalid_provider(key, e.to_string()))?;

    // The map key doubles as the id when the entry doesn't carry one
    if provider.id.is_empty() {
        provider.id = key.to_string();
    }

    provider.validate()?;
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::Category;

    const DOC: &str = r#"
stock_providers:
  finnhub:
    name: "Finnhub"
    base_url: "https://finnhub.io/api/v1"
    health_endpoint: "/quote?symbol=AAPL&token={api_key}"
    auth_type: none
    category: stock
    priority_score: 90
    required_env_keys: [FINNHUB_API_KEY]
  polygon:
    name: "Polygon"
    base_url: "https://api.polygon.io"
    health_endpoint: "/v2/aggs/ticker/AAPL/prev"
    auth_type: bearer
    category: stock
    priority_score: 80
    required_env_keys: [POLYGON_API_KEY]

crypto_providers:
  coingecko:
    name: "CoinGecko"
    base_url: "https://api.coingecko.com/api/v3"
    health_endpoint: "/ping"
    category: crypto
    priority_score: 95

backup_providers:
  yahoo_backup:
    name: "Yahoo Finance (backup)"
    base_url: "https://query1.finance.yahoo.com"
    health_endpoint: "/v8/finance/chart/AAPL"
    category: stock
    priority_score: 30

monitor:
  check_interval: "45s"
  breaker_threshold: 4
"#;

    #[test]
    fn test_load_groups_and_inject_ids() {
        let doc = load_from_str(DOC).unwrap();

        assert_eq!(doc.providers.len(), 4);
        assert_eq!(doc.skipped, 0);

        let finnhub = &doc.providers["finnhub"];
        assert_eq!(finnhub.id, "finnhub");
        assert_eq!(finnhub.category, Category::Stock);
        assert_eq!(finnhub.priority_score, 90);

        // backup_providers ends in _providers and is picked up
        assert!(doc.providers.contains_key("yahoo_backup"));
    }

    #[test]
    fn test_monitor_section_parsed() {
        let doc = load_from_str(DOC).unwrap();
        assert_eq!(doc.settings.check_interval.as_secs(), 45);
        assert_eq!(doc.settings.breaker_threshold, 4);
        // untouched settings keep defaults
        assert_eq!(doc.settings.uptime_window, 100);
    }

    #[test]
    fn test_invalid_entry_skipped_with_count() {
        let doc = r#"
stock_providers:
  good:
    name: "Good"
    base_url: "https://example.com"
    health_endpoint: "/health"
    category: stock
  bad:
    name: "Bad"
    base_url: "https://example.com"
    health_endpoint: "/health"
    priority_score: 250
"#;
        let parsed = load_from_str(doc).unwrap();
        assert_eq!(parsed.providers.len(), 1);
        assert_eq!(parsed.skipped, 1);
        assert!(parsed.providers.contains_key("good"));
    }

    #[test]
    fn test_five_valid_one_malformed() {
        let doc = r#"
general_providers:
  p1: { name: "P1", base_url: "https://example.com/1", health_endpoint: "/h" }
  p2: { name: "P2", base_url: "https://example.com/2", health_endpoint: "/h" }
  p3: { name: "P3", base_url: "https://example.com/3", health_endpoint: "/h" }
  p4: { name: "P4", base_url: "https://example.com/4", health_endpoint: "/h" }
  p5: { name: "P5", base_url: "https://example.com/5", health_endpoint: "/h" }
  broken: { name: "Broken", base_url: "", health_endpoint: "/h" }
"#;
        let parsed = load_from_str(doc).unwrap();
        assert_eq!(parsed.providers.len(), 5);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_empty_registry_fails() {
        let doc = r#"
stock_providers:
  only:
    name: "Only"
    base_url: ""
    health_endpoint: "/h"
"#;
        let err = load_from_str(doc).unwrap_err();
        assert!(matches!(err, Error::EmptyRegistry));
    }

    #[test]
    fn test_unparsable_document_fails() {
        assert!(load_from_str("not: [valid").is_err());
    }

    #[test]
    fn test_duplicate_id_across_groups_skipped() {
        let doc = r#"
stock_providers:
  dupe: { name: "A", base_url: "https://a.example.com", health_endpoint: "/h" }
crypto_providers:
  dupe: { name: "B", base_url: "https://b.example.com", health_endpoint: "/h" }
"#;
        let parsed = load_from_str(doc).unwrap();
        assert_eq!(parsed.providers.len(), 1);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_non_provider_keys_ignored() {
        let doc = r#"
notes: "this is not a provider group"
stock_providers:
  p: { name: "P", base_url: "https://example.com", health_endpoint: "/h" }
"#;
        let parsed = load_from_str(doc).unwrap();
        assert_eq!(parsed.providers.len(), 1);
    }
}
