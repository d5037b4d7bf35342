//! Health ledger over a state backend

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vigil_core::{
    Error, HealthRecord, HealthSnapshot, HealthSummary, MonitorSettings, ProviderStatus, Result,
};
use vigil_state::StateBackend;

/// Score weights per recorded status; breaker-open weighs double because it
/// represents sustained failure, not a single bad check
const WEIGHT_HEALTHY: f64 = 1.0;
const WEIGHT_UNHEALTHY: f64 = -1.0;
const WEIGHT_BREAKER_OPEN: f64 = -2.0;

/// Ledger tunables
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    /// Consecutive failures required to open the breaker
    pub breaker_threshold: i64,
    /// How long an open breaker suppresses probes
    pub breaker_timeout: Duration,
    /// Rolling window length for uptime/score computation
    pub uptime_window: usize,
    /// Cap on the detailed history list
    pub history_cap: usize,
    /// TTL on the current-status snapshot
    pub status_ttl: Duration,
    /// TTL on the rolling uptime list
    pub uptime_ttl: Duration,
    /// TTL on the detailed history list
    pub history_ttl: Duration,
    /// How long a computed health score may be served from cache
    pub score_cache_ttl: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            breaker_threshold: 5,
            breaker_timeout: Duration::from_secs(300),
            uptime_window: 100,
            history_cap: 1000,
            status_ttl: Duration::from_secs(3600),
            uptime_ttl: Duration::from_secs(24 * 3600),
            history_ttl: Duration::from_secs(7 * 24 * 3600),
            score_cache_ttl: Duration::from_secs(300),
        }
    }
}

impl From<&MonitorSettings> for LedgerConfig {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            breaker_threshold: settings.breaker_threshold,
            breaker_timeout: settings.breaker_timeout,
            uptime_window: settings.uptime_window,
            history_cap: settings.history_cap,
            ..Default::default()
        }
    }
}

/// The health ledger
///
/// Cheap to clone; all clones share the same backend connection and score
/// cache.
#[derive(Debug, Clone)]
pub struct HealthLedger<B: StateBackend> {
    backend: B,
    config: LedgerConfig,
    score_cache: Arc<DashMap<String, (f64, Instant)>>,
}

fn store_err(e: vigil_state::Error) -> Error {
    Error::Store(e.to_string())
}

fn health_key(id: &str) -> String {
    format!("health:{id}")
}

fn uptime_key(id: &str) -> String {
    format!("uptime:{id}")
}

fn history_key(id: &str) -> String {
    format!("history:{id}")
}

fn breaker_key(id: &str) -> String {
    format!("breaker:{id}")
}

fn breaker_opened_key(id: &str) -> String {
    format!("breaker_opened:{id}")
}

impl<B: StateBackend> HealthLedger<B> {
    /// Create a ledger over a backend
    pub fn new(backend: B, config: LedgerConfig) -> Self {
        Self {
            backend,
            config,
            score_cache: Arc::new(DashMap::new()),
        }
    }

    /// The ledger configuration
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Verify the underlying store is reachable
    pub async fn ping(&self) -> Result<()> {
        self.backend
            .health_check()
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))
    }

    /// Record one probe outcome
    ///
    /// Updates the snapshot, both history lists, and the circuit breaker, and
    /// invalidates the provider's cached health score.
    pub async fn record_result(&self, record: &HealthRecord) -> Result<()> {
        let id = record.provider_id.as_str();

        // (a) current-status snapshot
        let snapshot = HealthSnapshot::from(record);
        self.backend
            .set(
                &health_key(id),
                serde_json::to_vec(&snapshot)?,
                Some(self.config.status_ttl),
            )
            .await
            .map_err(store_err)?;

        // (b) rolling uptime history
        self.backend
            .list_push(
                &uptime_key(id),
                record.status.as_str().as_bytes().to_vec(),
                self.config.uptime_window,
                Some(self.config.uptime_ttl),
            )
            .await
            .map_err(store_err)?;

        // (c) detailed history
        self.backend
            .list_push(
                &history_key(id),
                serde_json::to_vec(record)?,
                self.config.history_cap,
                Some(self.config.history_ttl),
            )
            .await
            .map_err(store_err)?;

        // (d) circuit breaker
        self.update_breaker(id, record.status).await?;

        // (e) score cache invalidation
        self.score_cache.remove(id);

        debug!(
            provider_id = id,
            status = %record.status,
            response_time = ?record.response_time,
            "Recorded health result"
        );

        Ok(())
    }

    async fn update_breaker(&self, id: &str, status: ProviderStatus) -> Result<()> {
        if status == ProviderStatus::Healthy {
            self.backend.delete(&breaker_key(id)).await.map_err(store_err)?;
            self.backend
                .delete(&breaker_opened_key(id))
                .await
                .map_err(store_err)?;
            return Ok(());
        }

        if !status.is_failure() {
            // breaker-open records don't feed back into the counter
            return Ok(());
        }

        // The threshold comparison uses the post-increment value returned by
        // the store's atomic increment; two concurrent failures cannot both
        // see "below threshold".
        let failures = self
            .backend
            .increment(&breaker_key(id), 1, Some(self.config.breaker_timeout))
            .await
            .map_err(store_err)?;

        if failures >= self.config.breaker_threshold {
            let already_open = self
                .backend
                .exists(&breaker_opened_key(id))
                .await
                .map_err(store_err)?;
            if !already_open {
                self.backend
                    .set(
                        &breaker_opened_key(id),
                        Utc::now().to_rfc3339().into_bytes(),
                        Some(self.config.breaker_timeout),
                    )
                    .await
                    .map_err(store_err)?;
                warn!(
                    provider_id = id,
                    consecutive_failures = failures,
                    "Circuit breaker opened"
                );
            }
        }

        Ok(())
    }

    /// Whether the provider's circuit breaker is currently open
    ///
    /// If the breaker timeout has elapsed this call also clears the breaker
    /// state (read-triggered reset) and returns false.
    pub async fn is_breaker_open(&self, id: &str) -> Result<bool> {
        let failures = match self.backend.get(&breaker_key(id)).await.map_err(store_err)? {
            Some(raw) => parse_i64(&raw),
            None => return Ok(false),
        };
        if failures < self.config.breaker_threshold {
            return Ok(false);
        }

        let opened_at = match self
            .backend
            .get(&breaker_opened_key(id))
            .await
            .map_err(store_err)?
        {
            Some(raw) => parse_timestamp(&raw),
            None => None,
        };

        let Some(opened_at) = opened_at else {
            // Counter over threshold but no opened-at marker: stale state,
            // clear it rather than wedging the provider open forever
            self.clear_breaker(id).await?;
            return Ok(false);
        };

        let elapsed = Utc::now().signed_duration_since(opened_at);
        let timeout = chrono::Duration::from_std(self.config.breaker_timeout)
            .map_err(|e| Error::Internal(e.to_string()))?;

        if elapsed < timeout {
            Ok(true)
        } else {
            self.clear_breaker(id).await?;
            info!(provider_id = id, "Circuit breaker timeout elapsed, reset");
            Ok(false)
        }
    }

    async fn clear_breaker(&self, id: &str) -> Result<()> {
        self.backend.delete(&breaker_key(id)).await.map_err(store_err)?;
        self.backend
            .delete(&breaker_opened_key(id))
            .await
            .map_err(store_err)?;
        Ok(())
    }

    /// Current consecutive-failure count (0 when the key is absent)
    pub async fn consecutive_failures(&self, id: &str) -> Result<i64> {
        Ok(self
            .backend
            .get(&breaker_key(id))
            .await
            .map_err(store_err)?
            .map(|raw| parse_i64(&raw))
            .unwrap_or(0))
    }

    /// Latest status snapshot for a provider, if any check has run
    pub async fn get_current_health(&self, id: &str) -> Result<Option<HealthSnapshot>> {
        match self.backend.get(&health_key(id)).await.map_err(store_err)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    /// Statuses over the most recent `window` checks, newest first
    pub async fn recent_statuses(&self, id: &str, window: usize) -> Result<Vec<ProviderStatus>> {
        let raw = self
            .backend
            .list_range(&uptime_key(id), 0, window as isize - 1)
            .await
            .map_err(store_err)?;

        Ok(raw
            .iter()
            .filter_map(|bytes| std::str::from_utf8(bytes).ok())
            .filter_map(ProviderStatus::parse)
            .collect())
    }

    /// Uptime percentage over the rolling window; 0 when no history exists
    pub async fn get_uptime_percentage(&self, id: &str, window: usize) -> Result<f64> {
        let statuses = self.recent_statuses(id, window).await?;
        if statuses.is_empty() {
            return Ok(0.0);
        }

        let healthy = statuses
            .iter()
            .filter(|s| **s == ProviderStatus::Healthy)
            .count();
        Ok(healthy as f64 / statuses.len() as f64 * 100.0)
    }

    /// Weighted composite health score over the rolling window, in [0, 100]
    ///
    /// Cached briefly; invalidated by every [`record_result`](Self::record_result).
    pub async fn get_health_score(&self, id: &str) -> Result<f64> {
        if let Some(entry) = self.score_cache.get(id) {
            let (score, computed_at) = *entry;
            if computed_at.elapsed() < self.config.score_cache_ttl {
                return Ok(score);
            }
        }

        let statuses = self.recent_statuses(id, self.config.uptime_window).await?;
        let score = if statuses.is_empty() {
            0.0
        } else {
            let sum: f64 = statuses
                .iter()
                .map(|s| match s {
                    ProviderStatus::Healthy => WEIGHT_HEALTHY,
                    ProviderStatus::CircuitBreakerOpen => WEIGHT_BREAKER_OPEN,
                    ProviderStatus::Unhealthy | ProviderStatus::Error => WEIGHT_UNHEALTHY,
                })
                .sum();
            // Normalized against the best possible window, floored at 0
            (sum / statuses.len() as f64 * 100.0).clamp(0.0, 100.0)
        };

        self.score_cache
            .insert(id.to_string(), (score, Instant::now()));
        Ok(score)
    }

    /// Full derived summary for a provider
    pub async fn get_summary(&self, id: &str) -> Result<HealthSummary> {
        let statuses = self.recent_statuses(id, self.config.uptime_window).await?;
        let uptime_percentage = if statuses.is_empty() {
            0.0
        } else {
            statuses
                .iter()
                .filter(|s| **s == ProviderStatus::Healthy)
                .count() as f64
                / statuses.len() as f64
                * 100.0
        };
        let recent_failure_count = statuses
            .iter()
            .filter(|s| **s != ProviderStatus::Healthy)
            .count() as u64;

        let records = self.recent_records(id, self.config.uptime_window).await?;
        let times: Vec<f64> = records.iter().filter_map(|r| r.response_time).collect();
        let average_response_time = if times.is_empty() {
            None
        } else {
            Some(times.iter().sum::<f64>() / times.len() as f64)
        };

        Ok(HealthSummary {
            uptime_percentage,
            health_score: self.get_health_score(id).await?,
            average_response_time,
            recent_failure_count,
        })
    }

    /// Most recent detailed records, newest first
    pub async fn recent_records(&self, id: &str, limit: usize) -> Result<Vec<HealthRecord>> {
        let raw = self
            .backend
            .list_range(&history_key(id), 0, limit as isize - 1)
            .await
            .map_err(store_err)?;

        Ok(raw
            .iter()
            .filter_map(|bytes| serde_json::from_slice(bytes).ok())
            .collect())
    }

    /// Ids of all providers whose latest snapshot is healthy
    ///
    /// Category filtering happens at the caller, which owns the registry.
    pub async fn get_all_healthy(&self) -> Result<Vec<String>> {
        let keys = self
            .backend
            .keys("health:*")
            .await
            .map_err(store_err)?;

        let mut healthy = Vec::new();
        for key in keys {
            let Some(id) = key.strip_prefix("health:") else {
                continue;
            };
            if let Some(snapshot) = self.get_current_health(id).await? {
                if snapshot.status == ProviderStatus::Healthy {
                    healthy.push(id.to_string());
                }
            }
        }
        healthy.sort();
        Ok(healthy)
    }

    /// Defensive maintenance: re-trim both history lists back to their caps
    ///
    /// TTLs are the primary expiry mechanism; this only handles lists that
    /// grew past their caps between push and trim. Returns how many entries
    /// were dropped.
    pub async fn cleanup(&self) -> Result<usize> {
        let mut dropped = 0;

        for key in self.backend.keys("uptime:*").await.map_err(store_err)? {
            dropped += self
                .backend
                .list_trim(&key, self.config.uptime_window)
                .await
                .map_err(store_err)?;
        }
        for key in self.backend.keys("history:*").await.map_err(store_err)? {
            dropped += self
                .backend
                .list_trim(&key, self.config.history_cap)
                .await
                .map_err(store_err)?;
        }

        if dropped > 0 {
            debug!(dropped, "Ledger cleanup trimmed over-length lists");
        }
        Ok(dropped)
    }
}

fn parse_i64(raw: &[u8]) -> i64 {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn parse_timestamp(raw: &[u8]) -> Option<DateTime<Utc>> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;
    use vigil_state::InMemoryBackend;

    fn ledger() -> HealthLedger<InMemoryBackend> {
        HealthLedger::new(InMemoryBackend::new(), LedgerConfig::default())
    }

    fn ledger_with(config: LedgerConfig) -> HealthLedger<InMemoryBackend> {
        HealthLedger::new(InMemoryBackend::new(), config)
    }

    #[tokio::test]
    async fn test_record_and_snapshot() {
        let ledger = ledger();

        let record = HealthRecord::healthy("finnhub", 0.12, 200);
        ledger.record_result(&record).await.unwrap();

        let snapshot = ledger.get_current_health("finnhub").await.unwrap().unwrap();
        assert_eq!(snapshot.status, ProviderStatus::Healthy);
        assert_eq!(snapshot.response_time, Some(0.12));
        assert_eq!(snapshot.http_status, Some(200));

        assert!(ledger.get_current_health("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_uptime_percentage_70_30() {
        let ledger = ledger();

        for i in 0..100 {
            let record = if i < 70 {
                HealthRecord::healthy("p", 0.1, 200)
            } else {
                HealthRecord::unhealthy("p", 0.1, 500, "HTTP 500")
            };
            ledger.record_result(&record).await.unwrap();
        }

        let uptime = ledger.get_uptime_percentage("p", 100).await.unwrap();
        assert!((uptime - 70.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_uptime_window_caps_at_w() {
        let config = LedgerConfig {
            uptime_window: 10,
            ..Default::default()
        };
        let ledger = ledger_with(config);

        // 10 failures, then 10 successes; window only sees the successes
        for _ in 0..10 {
            ledger
                .record_result(&HealthRecord::error("p", "boom"))
                .await
                .unwrap();
        }
        for _ in 0..10 {
            ledger
                .record_result(&HealthRecord::healthy("p", 0.1, 200))
                .await
                .unwrap();
        }

        let uptime = ledger.get_uptime_percentage("p", 10).await.unwrap();
        assert!((uptime - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_uptime_no_history_is_zero() {
        let ledger = ledger();
        assert_eq!(ledger.get_uptime_percentage("ghost", 100).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_breaker_opens_at_threshold() {
        let config = LedgerConfig {
            breaker_threshold: 3,
            ..Default::default()
        };
        let ledger = ledger_with(config);

        for _ in 0..2 {
            ledger
                .record_result(&HealthRecord::unhealthy("p", 0.1, 500, "HTTP 500"))
                .await
                .unwrap();
            assert!(!ledger.is_breaker_open("p").await.unwrap());
        }

        // Third consecutive failure crosses the threshold
        ledger
            .record_result(&HealthRecord::unhealthy("p", 0.1, 500, "HTTP 500"))
            .await
            .unwrap();
        assert!(ledger.is_breaker_open("p").await.unwrap());
        assert_eq!(ledger.consecutive_failures("p").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_success_clears_breaker() {
        let config = LedgerConfig {
            breaker_threshold: 2,
            ..Default::default()
        };
        let ledger = ledger_with(config);

        for _ in 0..2 {
            ledger
                .record_result(&HealthRecord::error("p", "timeout"))
                .await
                .unwrap();
        }
        assert!(ledger.is_breaker_open("p").await.unwrap());

        ledger
            .record_result(&HealthRecord::healthy("p", 0.1, 200))
            .await
            .unwrap();
        assert!(!ledger.is_breaker_open("p").await.unwrap());
        assert_eq!(ledger.consecutive_failures("p").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_breaker_read_triggered_reset_after_timeout() {
        let config = LedgerConfig {
            breaker_threshold: 2,
            breaker_timeout: Duration::from_millis(80),
            ..Default::default()
        };
        let ledger = ledger_with(config);

        for _ in 0..2 {
            ledger
                .record_result(&HealthRecord::error("p", "timeout"))
                .await
                .unwrap();
        }
        assert!(ledger.is_breaker_open("p").await.unwrap());

        sleep(Duration::from_millis(120)).await;

        // The elapsed timeout resets the breaker on read
        assert!(!ledger.is_breaker_open("p").await.unwrap());
        assert_eq!(ledger.consecutive_failures("p").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_breaker_open_records_do_not_feed_counter() {
        let config = LedgerConfig {
            breaker_threshold: 2,
            ..Default::default()
        };
        let ledger = ledger_with(config);

        ledger
            .record_result(&HealthRecord::error("p", "boom"))
            .await
            .unwrap();
        ledger
            .record_result(&HealthRecord::circuit_open("p"))
            .await
            .unwrap();

        assert_eq!(ledger.consecutive_failures("p").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_score_bounds_all_failures_floor_at_zero() {
        let ledger = ledger();

        for _ in 0..50 {
            ledger
                .record_result(&HealthRecord::error("p", "down"))
                .await
                .unwrap();
        }
        for _ in 0..10 {
            ledger
                .record_result(&HealthRecord::circuit_open("p"))
                .await
                .unwrap();
        }

        let score = ledger.get_health_score("p").await.unwrap();
        assert_eq!(score, 0.0);
    }

    #[tokio::test]
    async fn test_score_all_healthy_is_100() {
        let ledger = ledger();

        for _ in 0..20 {
            ledger
                .record_result(&HealthRecord::healthy("p", 0.1, 200))
                .await
                .unwrap();
        }

        let score = ledger.get_health_score("p").await.unwrap();
        assert_eq!(score, 100.0);
    }

    #[tokio::test]
    async fn test_score_cache_invalidated_on_new_result() {
        let ledger = ledger();

        for _ in 0..10 {
            ledger
                .record_result(&HealthRecord::healthy("p", 0.1, 200))
                .await
                .unwrap();
        }
        assert_eq!(ledger.get_health_score("p").await.unwrap(), 100.0);

        // A burst of failures must be reflected immediately despite the cache
        for _ in 0..10 {
            ledger
                .record_result(&HealthRecord::error("p", "down"))
                .await
                .unwrap();
        }
        let score = ledger.get_health_score("p").await.unwrap();
        assert!(score < 100.0);
    }

    #[tokio::test]
    async fn test_get_all_healthy() {
        let ledger = ledger();

        ledger
            .record_result(&HealthRecord::healthy("alpha", 0.1, 200))
            .await
            .unwrap();
        ledger
            .record_result(&HealthRecord::healthy("beta", 0.1, 200))
            .await
            .unwrap();
        ledger
            .record_result(&HealthRecord::unhealthy("gamma", 0.1, 500, "HTTP 500"))
            .await
            .unwrap();

        let healthy = ledger.get_all_healthy().await.unwrap();
        assert_eq!(healthy, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn test_summary() {
        let ledger = ledger();

        for _ in 0..3 {
            ledger
                .record_result(&HealthRecord::healthy("p", 0.2, 200))
                .await
                .unwrap();
        }
        ledger
            .record_result(&HealthRecord::unhealthy("p", 0.4, 500, "HTTP 500"))
            .await
            .unwrap();

        let summary = ledger.get_summary("p").await.unwrap();
        assert!((summary.uptime_percentage - 75.0).abs() < f64::EPSILON);
        assert_eq!(summary.recent_failure_count, 1);
        let avg = summary.average_response_time.unwrap();
        assert!((avg - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cleanup_counts_trimmed() {
        let ledger = ledger();
        // Lists are trimmed on push, so a routine cleanup drops nothing
        ledger
            .record_result(&HealthRecord::healthy("p", 0.1, 200))
            .await
            .unwrap();
        assert_eq!(ledger.cleanup().await.unwrap(), 0);
    }
}
