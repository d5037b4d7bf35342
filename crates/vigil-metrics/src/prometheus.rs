//! Prometheus text exposition

use crate::collector::{MetricsCollector, BUCKETS};
use std::fmt::Write;
use std::sync::atomic::Ordering;

/// Renders collector state in Prometheus text format
#[derive(Debug)]
pub struct PrometheusExporter;

impl PrometheusExporter {
    /// Export metrics in Prometheus text format
    pub fn export(collector: &MetricsCollector) -> String {
        let mut output = String::with_capacity(8192);

        Self::write_check_counters(&mut output, collector);
        Self::write_provider_gauges(&mut output, collector);
        Self::write_category_gauges(&mut output, collector);
        Self::write_latency_histogram(&mut output, collector);
        Self::write_scheduler_metrics(&mut output, collector);

        output
    }

    fn write_check_counters(output: &mut String, collector: &MetricsCollector) {
        writeln!(
            output,
            "# HELP vigil_checks_total Total health checks performed"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_checks_total counter").unwrap();
        writeln!(output, "vigil_checks_total {}", collector.total_checks()).unwrap();

        writeln!(
            output,
            "# HELP vigil_checks_by_status_total Health checks per outcome"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_checks_by_status_total counter").unwrap();
        for status in [
            vigil_core::ProviderStatus::Healthy,
            vigil_core::ProviderStatus::Unhealthy,
            vigil_core::ProviderStatus::CircuitBreakerOpen,
            vigil_core::ProviderStatus::Error,
        ] {
            writeln!(
                output,
                "vigil_checks_by_status_total{{status=\"{}\"}} {}",
                status.as_str(),
                collector.checks_with_status(status)
            )
            .unwrap();
        }
    }

    fn write_provider_gauges(output: &mut String, collector: &MetricsCollector) {
        writeln!(
            output,
            "# HELP vigil_provider_health Provider health (1 healthy, 0 failing, -1 breaker open)"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_provider_health gauge").unwrap();
        for entry in collector.providers().iter() {
            writeln!(
                output,
                "vigil_provider_health{{provider=\"{}\",category=\"{}\"}} {}",
                sanitize_label(entry.key()),
                entry.value().category,
                entry.value().health.load(Ordering::Relaxed)
            )
            .unwrap();
        }

        writeln!(
            output,
            "# HELP vigil_provider_health_score Windowed composite health score, 0-100"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_provider_health_score gauge").unwrap();
        for entry in collector.providers().iter() {
            writeln!(
                output,
                "vigil_provider_health_score{{provider=\"{}\"}} {:.3}",
                sanitize_label(entry.key()),
                entry.value().score_milli.load(Ordering::Relaxed) as f64 / 1000.0
            )
            .unwrap();
        }

        writeln!(
            output,
            "# HELP vigil_provider_checks_total Checks performed per provider"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_provider_checks_total counter").unwrap();
        for entry in collector.providers().iter() {
            writeln!(
                output,
                "vigil_provider_checks_total{{provider=\"{}\"}} {}",
                sanitize_label(entry.key()),
                entry.value().checks.load(Ordering::Relaxed)
            )
            .unwrap();
        }

        writeln!(
            output,
            "# HELP vigil_provider_failures_total Failed checks per provider"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_provider_failures_total counter").unwrap();
        for entry in collector.providers().iter() {
            writeln!(
                output,
                "vigil_provider_failures_total{{provider=\"{}\"}} {}",
                sanitize_label(entry.key()),
                entry.value().failures.load(Ordering::Relaxed)
            )
            .unwrap();
        }
    }

    fn write_category_gauges(output: &mut String, collector: &MetricsCollector) {
        writeln!(
            output,
            "# HELP vigil_category_healthy_providers Healthy providers per category"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_category_healthy_providers gauge").unwrap();
        for entry in collector.categories().iter() {
            writeln!(
                output,
                "vigil_category_healthy_providers{{category=\"{}\"}} {}",
                entry.key(),
                entry.value().healthy.load(Ordering::Relaxed)
            )
            .unwrap();
        }

        writeln!(
            output,
            "# HELP vigil_category_providers Registered providers per category"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_category_providers gauge").unwrap();
        for entry in collector.categories().iter() {
            writeln!(
                output,
                "vigil_category_providers{{category=\"{}\"}} {}",
                entry.key(),
                entry.value().total.load(Ordering::Relaxed)
            )
            .unwrap();
        }
    }

    fn write_latency_histogram(output: &mut String, collector: &MetricsCollector) {
        let histogram = collector.latency();

        writeln!(
            output,
            "# HELP vigil_check_duration_seconds Health check duration including retries"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_check_duration_seconds histogram").unwrap();

        for (i, bound) in BUCKETS.iter().enumerate() {
            writeln!(
                output,
                "vigil_check_duration_seconds_bucket{{le=\"{}\"}} {}",
                bound,
                histogram.bucket_count(i)
            )
            .unwrap();
        }
        writeln!(
            output,
            "vigil_check_duration_seconds_bucket{{le=\"+Inf\"}} {}",
            histogram.count()
        )
        .unwrap();
        writeln!(
            output,
            "vigil_check_duration_seconds_sum {:.6}",
            histogram.sum_seconds()
        )
        .unwrap();
        writeln!(
            output,
            "vigil_check_duration_seconds_count {}",
            histogram.count()
        )
        .unwrap();
    }

    fn write_scheduler_metrics(output: &mut String, collector: &MetricsCollector) {
        writeln!(
            output,
            "# HELP vigil_scheduler_cycles_total Completed probe cycles"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_scheduler_cycles_total counter").unwrap();
        writeln!(output, "vigil_scheduler_cycles_total {}", collector.cycles()).unwrap();

        writeln!(
            output,
            "# HELP vigil_scheduler_last_cycle_milliseconds Duration of the last probe cycle"
        )
        .unwrap();
        writeln!(output, "# TYPE vigil_scheduler_last_cycle_milliseconds gauge").unwrap();
        writeln!(
            output,
            "vigil_scheduler_last_cycle_milliseconds {}",
            collector.last_cycle_millis()
        )
        .unwrap();
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
