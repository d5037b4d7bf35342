//! HTTP API for the monitor service

use crate::scheduler::Scheduler;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};
use vigil_core::{Error, ProviderHealth, ProviderStatus};
use vigil_ledger::HealthLedger;
use vigil_metrics::{MetricsCollector, PrometheusExporter};
use vigil_registry::{ListFilter, ProviderRegistry};
use vigil_state::StateBackend;

/// Shared state handed to every handler
#[derive(Debug, Clone)]
pub struct ApiState<B: StateBackend> {
    /// The running scheduler
    pub scheduler: Scheduler<B>,
    /// Provider registry
    pub registry: Arc<ProviderRegistry>,
    /// Health ledger
    pub ledger: HealthLedger<B>,
    /// Metrics collector backing `/metrics`
    pub metrics: MetricsCollector,
}

/// Aggregate fleet status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Registered providers
    pub total_providers: usize,
    /// Providers whose last check was healthy
    pub healthy_providers: usize,
    /// Everything else, including never-checked providers
    pub unhealthy_providers: usize,
    /// Per-category healthy/total breakdown
    pub categories: HashMap<String, CategoryStatus>,
    /// When this response was computed
    pub last_updated: DateTime<Utc>,
}

/// Healthy/total pair for one category
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryStatus {
    /// Providers whose last check was healthy
    pub healthy: usize,
    /// Registered providers in the category
    pub total: usize,
}

/// Detail view for one provider, current snapshot plus rolling stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealthDetail {
    /// Current status and last-check snapshot
    #[serde(flatten)]
    pub health: ProviderHealth,
    /// Weighted composite score over the window, 0-100
    pub health_score: f64,
    /// Average response time over the detailed history, seconds
    pub average_response_time: Option<f64>,
    /// Failures in the window
    pub recent_failure_count: u64,
}

/// Ack for a scheduled force-check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceCheckResponse {
    /// Always "scheduled"
    pub status: String,
    /// The provider the check was scheduled for
    pub provider_id: String,
}

/// JSON error payload; every API error path goes through here
#[derive(Debug)]
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.to_status_code();
        if status.is_server_error() {
            error!(error = %self.0, "API request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Bind the listener and serve the API until shutdown triggers
pub async fn serve<B: StateBackend>(
    state: ApiState<B>,
    addr: std::net::SocketAddr,
    shutdown: crate::ShutdownSignal,
) -> vigil_core::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(Error::Io)?;
    tracing::info!(listen = %addr, "HTTP API listening");

    let mut rx = shutdown.subscribe();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = rx.recv().await;
        })
        .await
        .map_err(Error::Io)?;
    Ok(())
}

/// Build the monitor's HTTP router
pub fn build_router<B: StateBackend>(state: ApiState<B>) -> Router {
    Router::new()
        .route("/health", get(health::<B>))
        .route("/metrics", get(metrics::<B>))
        .route("/api/providers/status", get(providers_status::<B>))
        .route("/api/providers/categories", get(categories::<B>))
        .route("/api/providers/:id/health", get(provider_health::<B>))
        .route("/api/providers/:id/force-check", post(force_check::<B>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health<B: StateBackend>(State(state): State<ApiState<B>>) -> Response {
    let store_connected = state.ledger.ping().await.is_ok();
    let body = serde_json::json!({
        "status": if store_connected { "ok" } else { "degraded" },
        "store_connected": store_connected,
        // Legacy alias kept for consumers of the original payload
        "redis_connected": store_connected,
        "scheduler_running": state.scheduler.is_running(),
    });

    let status = if store_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

async fn metrics<B: StateBackend>(State(state): State<ApiState<B>>) -> Response {
    let body = PrometheusExporter::export(&state.metrics);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

async fn providers_status<B: StateBackend>(
    State(state): State<ApiState<B>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let providers = state.registry.list(&ListFilter::default());

    let mut healthy_providers = 0;
    let mut categories: HashMap<String, CategoryStatus> = HashMap::new();

    for provider in &providers {
        let entry = categories
            .entry(provider.category.as_str().to_string())
            .or_insert(CategoryStatus {
                healthy: 0,
                total: 0,
            });
        entry.total += 1;

        let snapshot = state.ledger.get_current_health(&provider.id).await?;
        if snapshot.is_some_and(|s| s.status == ProviderStatus::Healthy) {
            healthy_providers += 1;
            entry.healthy += 1;
        }
    }

    Ok(Json(StatusResponse {
        total_providers: providers.len(),
        healthy_providers,
        unhealthy_providers: providers.len() - healthy_providers,
        categories,
        last_updated: Utc::now(),
    }))
}

async fn provider_health<B: StateBackend>(
    State(state): State<ApiState<B>>,
    Path(id): Path<String>,
) -> Result<Json<ProviderHealthDetail>, ApiError> {
    let provider = state.registry.get(&id)?;

    let snapshot = state.ledger.get_current_health(&provider.id).await?;
    let summary = state.ledger.get_summary(&provider.id).await?;

    let health = match snapshot {
        Some(snapshot) => ProviderHealth {
            provider_id: provider.id,
            status: snapshot.status,
            last_check: Some(snapshot.last_check),
            response_time: snapshot.response_time,
            error_message: snapshot.error,
            uptime_percentage: summary.uptime_percentage,
        },
        None => ProviderHealth {
            provider_id: provider.id,
            status: ProviderStatus::Error,
            last_check: None,
            response_time: None,
            error_message: Some("no checks recorded yet".to_string()),
            uptime_percentage: 0.0,
        },
    };

    Ok(Json(ProviderHealthDetail {
        health,
        health_score: summary.health_score,
        average_response_time: summary.average_response_time,
        recent_failure_count: summary.recent_failure_count,
    }))
}

async fn force_check<B: StateBackend>(
    State(state): State<ApiState<B>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    // 404 before scheduling anything
    state.registry.get(&id)?;

    let scheduler = state.scheduler.clone();
    let provider_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = scheduler.force_check(&provider_id).await {
            warn!(provider_id, error = %e, "Forced check failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ForceCheckResponse {
            status: "scheduled".to_string(),
            provider_id: id,
        }),
    )
        .into_response())
}

async fn categories<B: StateBackend>(
    State(state): State<ApiState<B>>,
) -> Json<HashMap<String, usize>> {
    let counts = state
        .registry
        .category_counts()
        .into_iter()
        .map(|(category, count)| (category.as_str().to_string(), count))
        .collect();
    Json(counts)
}
