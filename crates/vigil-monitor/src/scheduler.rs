//! Interval scheduler running bounded-concurrency probe cycles

use crate::events::{EventBus, HealthEvent};
use crate::shutdown::ShutdownSignal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use vigil_core::{Category, HealthRecord, MonitorSettings, ProviderStatus, Result};
use vigil_ledger::HealthLedger;
use vigil_metrics::MetricsCollector;
use vigil_probe::{ProbeConfig, Prober};
use vigil_registry::{ListFilter, ProviderRegistry};
use vigil_state::StateBackend;

/// Outcome of one probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    /// Providers probed
    pub total: usize,
    /// Providers whose check came back healthy
    pub healthy: usize,
    /// Checks that failed to record (store errors)
    pub record_failures: usize,
}

/// The probe scheduler
///
/// One cycle probes every registered provider through a semaphore-bounded
/// task batch; the batch is fully awaited before the next cycle starts, so
/// cycles never overlap.
#[derive(Debug, Clone)]
pub struct Scheduler<B: StateBackend> {
    registry: Arc<ProviderRegistry>,
    ledger: HealthLedger<B>,
    prober: Prober<HealthLedger<B>>,
    metrics: MetricsCollector,
    events: EventBus,
    settings: MonitorSettings,
    semaphore: Arc<Semaphore>,
    running: Arc<AtomicBool>,
}

impl<B: StateBackend> Scheduler<B> {
    /// Create a scheduler
    pub fn new(
        registry: Arc<ProviderRegistry>,
        ledger: HealthLedger<B>,
        metrics: MetricsCollector,
        events: EventBus,
        settings: MonitorSettings,
    ) -> Self {
        let prober = Prober::new(ledger.clone(), ProbeConfig::from(&settings));
        let semaphore = Arc::new(Semaphore::new(settings.max_concurrent_checks));
        Self {
            registry,
            ledger,
            prober,
            metrics,
            events,
            settings,
            semaphore,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the scheduler loop is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// The event bus cycles publish to
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Run cycles until shutdown
    ///
    /// The probe interval and the metrics-refresh interval tick
    /// independently; a slow cycle delays its own next tick but never the
    /// metrics refresh.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        self.running.store(true, Ordering::Relaxed);
        info!(
            check_interval = ?self.settings.check_interval,
            metrics_interval = ?self.settings.metrics_interval,
            max_concurrent = self.settings.max_concurrent_checks,
            "Scheduler started"
        );

        let mut check_timer = tokio::time::interval(self.settings.check_interval);
        check_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut metrics_timer = tokio::time::interval(self.settings.metrics_interval);
        metrics_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = shutdown.subscribe();

        loop {
            tokio::select! {
                _ = check_timer.tick() => {
                    let summary = self.run_cycle().await;
                    debug!(
                        total = summary.total,
                        healthy = summary.healthy,
                        "Probe cycle finished"
                    );
                }
                _ = metrics_timer.tick() => {
                    if let Err(e) = self.refresh_metrics().await {
                        warn!(error = %e, "Metrics refresh failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Scheduler stopping");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::Relaxed);
    }

    /// Probe every registered provider once
    pub async fn run_cycle(&self) -> CycleSummary {
        let start = Instant::now();
        let providers = self.registry.list(&ListFilter::default());
        let total = providers.len();

        let mut handles = Vec::with_capacity(total);
        for provider in providers {
            let prober = self.prober.clone();
            let semaphore = self.semaphore.clone();
            let id = provider.id.clone();
            let task_id = id.clone();
            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return HealthRecord::error(&task_id, "scheduler shutting down"),
                };
                prober.check(&provider).await
            });
            handles.push((id, handle));
        }

        let mut healthy = 0;
        let mut record_failures = 0;
        for (id, handle) in handles {
            // A panicked check becomes an error record for its provider
            // instead of sinking the whole batch
            let record = match handle.await {
                Ok(record) => record,
                Err(e) => {
                    error!(provider_id = %id, error = %e, "Probe task failed");
                    HealthRecord::error(&id, format!("probe task failed: {e}"))
                }
            };

            if record.status == ProviderStatus::Healthy {
                healthy += 1;
            }
            if let Err(e) = self.record(&record).await {
                warn!(provider_id = %record.provider_id, error = %e, "Failed to record result");
                record_failures += 1;
            }
        }

        self.metrics.record_cycle(start.elapsed());
        self.events.publish(HealthEvent::new(healthy, total));

        CycleSummary {
            total,
            healthy,
            record_failures,
        }
    }

    /// Probe one provider immediately, bypassing the interval
    pub async fn force_check(&self, provider_id: &str) -> Result<HealthRecord> {
        let provider = self.registry.get(provider_id)?;
        info!(provider_id, "Forcing immediate check");

        let record = self.prober.check(&provider).await;
        self.record(&record).await?;
        Ok(record)
    }

    /// Hot-reload the provider registry; returns true if it changed
    pub fn reload_registry(&self) -> Result<bool> {
        self.registry.reload()
    }

    async fn record(&self, record: &HealthRecord) -> Result<()> {
        self.ledger.record_result(record).await?;

        let category = self
            .registry
            .get(&record.provider_id)
            .map(|p| p.category)
            .unwrap_or_default();
        self.metrics.record_check(
            &record.provider_id,
            category,
            record.status,
            record.response_time.map(Duration::from_secs_f64),
        );
        Ok(())
    }

    /// Re-derive exported gauges from the ledger without probing
    pub async fn refresh_metrics(&self) -> Result<()> {
        let providers = self.registry.list(&ListFilter::default());

        let mut healthy_by_category: HashMap<Category, u64> = HashMap::new();
        let mut total_by_category: HashMap<Category, u64> = HashMap::new();

        for provider in &providers {
            *total_by_category.entry(provider.category).or_insert(0) += 1;

            if let Some(snapshot) = self.ledger.get_current_health(&provider.id).await? {
                if snapshot.status == ProviderStatus::Healthy {
                    *healthy_by_category.entry(provider.category).or_insert(0) += 1;
                }
            }

            let score = self.ledger.get_health_score(&provider.id).await?;
            self.metrics
                .set_health_score(&provider.id, provider.category, score);
        }

        for category in Category::ALL {
            let total = total_by_category.get(&category).copied().unwrap_or(0);
            if total == 0 {
                continue;
            }
            let healthy = healthy_by_category.get(&category).copied().unwrap_or(0);
            self.metrics.set_category_counts(category, healthy, total);
        }

        Ok(())
    }
}
