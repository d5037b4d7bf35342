//! Metrics collector for probe outcomes and derived health gauges

use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::{Category, ProviderStatus};

/// Latency histogram buckets, in seconds
pub(crate) const BUCKETS: [f64; 10] = [0.05, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0];

/// Cumulative-bucket latency histogram
#[derive(Debug)]
pub struct LatencyHistogram {
    bucket_counts: [AtomicU64; BUCKETS.len()],
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl LatencyHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        Self {
            bucket_counts: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record one observation
    pub fn observe(&self, duration: Duration) {
        let seconds = duration.as_secs_f64();
        for (i, bound) in BUCKETS.iter().enumerate() {
            if seconds <= *bound {
                self.bucket_counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.sum_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Total observations
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of all observations, seconds
    pub fn sum_seconds(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    pub(crate) fn bucket_count(&self, index: usize) -> u64 {
        self.bucket_counts[index].load(Ordering::Relaxed)
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-provider metric state
#[derive(Debug)]
pub(crate) struct ProviderMetrics {
    pub(crate) category: Category,
    pub(crate) checks: AtomicU64,
    pub(crate) failures: AtomicU64,
    /// 1 healthy, 0 unhealthy/error, -1 breaker open
    pub(crate) health: AtomicI64,
    /// Health score scaled by 1000 to fit an atomic integer
    pub(crate) score_milli: AtomicU64,
}

impl ProviderMetrics {
    fn new(category: Category) -> Self {
        Self {
            category,
            checks: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            health: AtomicI64::new(0),
            score_milli: AtomicU64::new(0),
        }
    }
}

/// Per-category healthy/total gauge pair
#[derive(Debug, Default)]
pub(crate) struct CategoryMetrics {
    pub(crate) healthy: AtomicU64,
    pub(crate) total: AtomicU64,
}

/// Main metrics collector for the monitor
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    total_checks: Arc<AtomicU64>,
    checks_by_status: Arc<DashMap<&'static str, AtomicU64>>,
    providers: Arc<DashMap<String, ProviderMetrics>>,
    categories: Arc<DashMap<Category, CategoryMetrics>>,
    latency: Arc<LatencyHistogram>,
    cycles: Arc<AtomicU64>,
    last_cycle_millis: Arc<AtomicU64>,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            total_checks: Arc::new(AtomicU64::new(0)),
            checks_by_status: Arc::new(DashMap::new()),
            providers: Arc::new(DashMap::new()),
            categories: Arc::new(DashMap::new()),
            latency: Arc::new(LatencyHistogram::new()),
            cycles: Arc::new(AtomicU64::new(0)),
            last_cycle_millis: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record one completed check
    pub fn record_check(
        &self,
        provider_id: &str,
        category: Category,
        status: ProviderStatus,
        response_time: Option<Duration>,
    ) {
        self.total_checks.fetch_add(1, Ordering::Relaxed);
        self.checks_by_status
            .entry(status.as_str())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);

        let entry = self
            .providers
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderMetrics::new(category));
        entry.checks.fetch_add(1, Ordering::Relaxed);
        if status != ProviderStatus::Healthy {
            entry.failures.fetch_add(1, Ordering::Relaxed);
        }
        let gauge = match status {
            ProviderStatus::Healthy => 1,
            ProviderStatus::CircuitBreakerOpen => -1,
            ProviderStatus::Unhealthy | ProviderStatus::Error => 0,
        };
        entry.health.store(gauge, Ordering::Relaxed);

        if let Some(duration) = response_time {
            self.latency.observe(duration);
        }
    }

    /// Update a provider's health-score gauge
    pub fn set_health_score(&self, provider_id: &str, category: Category, score: f64) {
        let entry = self
            .providers
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderMetrics::new(category));
        entry
            .score_milli
            .store((score * 1000.0) as u64, Ordering::Relaxed);
    }

    /// Replace the healthy/total gauges for a category
    pub fn set_category_counts(&self, category: Category, healthy: u64, total: u64) {
        let entry = self.categories.entry(category).or_default();
        entry.healthy.store(healthy, Ordering::Relaxed);
        entry.total.store(total, Ordering::Relaxed);
    }

    /// Record one completed scheduler cycle
    pub fn record_cycle(&self, duration: Duration) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_millis
            .store(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Total checks recorded since startup
    pub fn total_checks(&self) -> u64 {
        self.total_checks.load(Ordering::Relaxed)
    }

    /// Checks recorded with the given outcome
    pub fn checks_with_status(&self, status: ProviderStatus) -> u64 {
        self.checks_by_status
            .get(status.as_str())
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Completed scheduler cycles
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Duration of the most recent cycle, milliseconds
    pub fn last_cycle_millis(&self) -> u64 {
        self.last_cycle_millis.load(Ordering::Relaxed)
    }

    /// Number of providers with recorded metrics
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// The probe latency histogram
    pub fn latency(&self) -> &LatencyHistogram {
        &self.latency
    }

    pub(crate) fn providers(&self) -> &DashMap<String, ProviderMetrics> {
        &self.providers
    }

    pub(crate) fn categories(&self) -> &DashMap<Category, CategoryMetrics> {
        &self.categories
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_check_updates_counters() {
        let collector = MetricsCollector::new();
        collector.record_check(
            "finnhub",
            Category::Stock,
            ProviderStatus::Healthy,
            Some(Duration::from_millis(120)),
        );
        collector.record_check("finnhub", Category::Stock, ProviderStatus::Unhealthy, None);

        assert_eq!(collector.total_checks(), 2);
        assert_eq!(collector.checks_with_status(ProviderStatus::Healthy), 1);
        assert_eq!(collector.checks_with_status(ProviderStatus::Unhealthy), 1);
        assert_eq!(collector.provider_count(), 1);
    }

    #[test]
    fn test_health_gauge_follows_last_status() {
        let collector = MetricsCollector::new();
        collector.record_check("p", Category::Crypto, ProviderStatus::Healthy, None);
        assert_eq!(
            collector.providers().get("p").unwrap().health.load(Ordering::Relaxed),
            1
        );

        collector.record_check("p", Category::Crypto, ProviderStatus::CircuitBreakerOpen, None);
        assert_eq!(
            collector.providers().get("p").unwrap().health.load(Ordering::Relaxed),
            -1
        );
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let histogram = LatencyHistogram::new();
        histogram.observe(Duration::from_millis(60));
        histogram.observe(Duration::from_millis(300));

        // 60ms lands in every bucket from 0.1 up; 300ms from 0.5 up
        assert_eq!(histogram.bucket_count(0), 0); // <= 0.05
        assert_eq!(histogram.bucket_count(1), 1); // <= 0.1
        assert_eq!(histogram.bucket_count(3), 2); // <= 0.5
        assert_eq!(histogram.count(), 2);
        assert!((histogram.sum_seconds() - 0.36).abs() < 1e-6);
    }

    #[test]
    fn test_category_counts() {
        let collector = MetricsCollector::new();
        collector.set_category_counts(Category::Stock, 3, 5);

        let entry = collector.categories().get(&Category::Stock).unwrap();
        assert_eq!(entry.healthy.load(Ordering::Relaxed), 3);
        assert_eq!(entry.total.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_cycle_metrics() {
        let collector = MetricsCollector::new();
        collector.record_cycle(Duration::from_millis(2500));
        assert_eq!(collector.cycles(), 1);
        assert_eq!(collector.last_cycle_millis(), 2500);
    }
}
