//! # Vigil Metrics
//!
//! In-process metrics for the monitor:
//! - Check counters per provider and per outcome
//! - Per-provider health and health-score gauges
//! - Per-category healthy/total gauges
//! - A real bucketed latency histogram for probe durations
//!
//! [`PrometheusExporter`] renders everything in Prometheus text exposition
//! format for the `/metrics` endpoint.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

mod collector;
mod prometheus;

pub use collector::{LatencyHistogram, MetricsCollector};
pub use prometheus::PrometheusExporter;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::collector::{LatencyHistogram, MetricsCollector};
    pub use crate::prometheus::PrometheusExporter;
}
