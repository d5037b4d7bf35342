//! Query facade for data-fetching collaborators
//!
//! Upstream code that needs a provider should only ever ask these three
//! questions; everything else in the subsystem is internal.

use std::sync::Arc;
use tracing::debug;
use vigil_core::{Category, ProviderStatus, Result};
use vigil_ledger::HealthLedger;
use vigil_registry::ProviderRegistry;
use vigil_state::StateBackend;

/// Narrow read-only client over the registry and ledger
#[derive(Debug, Clone)]
pub struct MonitorClient<B: StateBackend> {
    registry: Arc<ProviderRegistry>,
    ledger: HealthLedger<B>,
}

impl<B: StateBackend> MonitorClient<B> {
    /// Create a client
    pub fn new(registry: Arc<ProviderRegistry>, ledger: HealthLedger<B>) -> Self {
        Self { registry, ledger }
    }

    /// Whether the provider's last check was healthy and its breaker closed
    ///
    /// Unknown or never-checked providers are not healthy.
    pub async fn is_healthy(&self, provider_id: &str) -> bool {
        if !self.registry.contains(provider_id) {
            return false;
        }
        if self.ledger.is_breaker_open(provider_id).await.unwrap_or(true) {
            return false;
        }
        match self.ledger.get_current_health(provider_id).await {
            Ok(Some(snapshot)) => snapshot.status == ProviderStatus::Healthy,
            _ => false,
        }
    }

    /// Ordered failover candidates for a category
    ///
    /// Available providers sorted by priority, minus the excluded ids and
    /// minus anything with an open breaker.
    pub async fn failover_chain(&self, category: Category, exclude: &[String]) -> Vec<String> {
        let candidates = self.registry.failover_chain(category, exclude, usize::MAX);

        let mut chain = Vec::with_capacity(candidates.len());
        for provider in candidates {
            if self.ledger.is_breaker_open(&provider.id).await.unwrap_or(false) {
                debug!(provider_id = %provider.id, "Skipping breaker-open failover candidate");
                continue;
            }
            chain.push(provider.id);
        }
        chain
    }

    /// Windowed composite health score for a provider, 0-100
    pub async fn health_score(&self, provider_id: &str) -> Result<f64> {
        self.registry.get(provider_id)?;
        self.ledger.get_health_score(provider_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use vigil_core::HealthRecord;
    use vigil_ledger::LedgerConfig;
    use vigil_state::InMemoryBackend;

    const DOC: &str = r#"
stock_providers:
  primary:
    name: "Primary"
    base_url: "https://primary.example.com"
    health_endpoint: "/h"
    category: stock
    priority_score: 90
  secondary:
    name: "Secondary"
    base_url: "https://secondary.example.com"
    health_endpoint: "/h"
    category: stock
    priority_score: 60
"#;

    async fn client() -> (MonitorClient<InMemoryBackend>, NamedTempFile) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(DOC.as_bytes()).unwrap();
        file.flush().unwrap();

        let (registry, _) = ProviderRegistry::load(file.path()).unwrap();
        let ledger = HealthLedger::new(
            InMemoryBackend::new(),
            LedgerConfig {
                breaker_threshold: 2,
                ..Default::default()
            },
        );
        (MonitorClient::new(Arc::new(registry), ledger), file)
    }

    #[tokio::test]
    async fn test_is_healthy() {
        let (client, _file) = client().await;

        // no checks yet
        assert!(!client.is_healthy("primary").await);
        assert!(!client.is_healthy("unknown").await);

        client
            .ledger
            .record_result(&HealthRecord::healthy("primary", 0.1, 200))
            .await
            .unwrap();
        assert!(client.is_healthy("primary").await);

        client
            .ledger
            .record_result(&HealthRecord::unhealthy("primary", 0.1, 500, "HTTP 500"))
            .await
            .unwrap();
        assert!(!client.is_healthy("primary").await);
    }

    #[tokio::test]
    async fn test_failover_chain_skips_open_breakers() {
        let (client, _file) = client().await;

        let chain = client.failover_chain(Category::Stock, &[]).await;
        assert_eq!(chain, vec!["primary".to_string(), "secondary".to_string()]);

        // trip primary's breaker
        for _ in 0..2 {
            client
                .ledger
                .record_result(&HealthRecord::error("primary", "down"))
                .await
                .unwrap();
        }

        let chain = client.failover_chain(Category::Stock, &[]).await;
        assert_eq!(chain, vec!["secondary".to_string()]);

        let chain = client
            .failover_chain(Category::Stock, &["secondary".to_string()])
            .await;
        assert!(chain.is_empty());
    }

    #[tokio::test]
    async fn test_health_score_requires_known_provider() {
        let (client, _file) = client().await;
        assert!(client.health_score("unknown").await.is_err());
        assert_eq!(client.health_score("primary").await.unwrap(), 0.0);
    }
}
