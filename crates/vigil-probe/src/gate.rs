//! Circuit-breaker gate consulted before every probe

use async_trait::async_trait;
use tracing::warn;
use vigil_ledger::HealthLedger;
use vigil_state::StateBackend;

/// Answers "is this provider's circuit breaker open right now"
///
/// The prober only needs this one question from the ledger; keeping it a
/// trait lets tests gate probes without standing up a store.
#[async_trait]
pub trait BreakerGate: Send + Sync {
    /// Whether probes against this provider should be suppressed
    async fn is_open(&self, provider_id: &str) -> bool;
}

#[async_trait]
impl<B: StateBackend> BreakerGate for HealthLedger<B> {
    async fn is_open(&self, provider_id: &str) -> bool {
        match self.is_breaker_open(provider_id).await {
            Ok(open) => open,
            Err(e) => {
                // A store hiccup must not wedge the provider shut
                warn!(provider_id, error = %e, "Breaker lookup failed, probing anyway");
                false
            }
        }
    }
}
