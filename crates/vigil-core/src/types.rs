//! Provider and health-record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Authentication scheme a provider expects on its health endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    /// No credentials required
    #[default]
    None,
    /// Credential sent in a custom API-key header
    ApiKey,
    /// Credential sent as `Authorization: Bearer <key>`
    Bearer,
    /// Credential sent as `Authorization: Basic <key>`
    Basic,
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthType::None => write!(f, "none"),
            AuthType::ApiKey => write!(f, "api_key"),
            AuthType::Bearer => write!(f, "bearer"),
            AuthType::Basic => write!(f, "basic"),
        }
    }
}

/// Data category served by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Equities quotes and fundamentals
    Stock,
    /// Cryptocurrency rates
    Crypto,
    /// Foreign exchange rates
    Forex,
    /// News articles
    News,
    /// Anything else
    #[default]
    General,
}

impl Category {
    /// All known categories, in a stable order
    pub const ALL: [Category; 5] = [
        Category::Stock,
        Category::Crypto,
        Category::Forex,
        Category::News,
        Category::General,
    ];

    /// The label used in serialized form and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Stock => "stock",
            Category::Crypto => "crypto",
            Category::Forex => "forex",
            Category::News => "news",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Provider responded 200 and passed shape validation
    Healthy,
    /// Provider responded with a server error
    Unhealthy,
    /// The circuit breaker is open; no call was made
    CircuitBreakerOpen,
    /// Auth, rate-limit, validation, or exhausted-retry failure
    Error,
}

impl ProviderStatus {
    /// The label used in serialized form and store keys
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderStatus::Healthy => "healthy",
            ProviderStatus::Unhealthy => "unhealthy",
            ProviderStatus::CircuitBreakerOpen => "circuit_breaker_open",
            ProviderStatus::Error => "error",
        }
    }

    /// Parse the serialized label back into a status
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "healthy" => Some(ProviderStatus::Healthy),
            "unhealthy" => Some(ProviderStatus::Unhealthy),
            "circuit_breaker_open" => Some(ProviderStatus::CircuitBreakerOpen),
            "error" => Some(ProviderStatus::Error),
            _ => None,
        }
    }

    /// Whether this status counts as a breaker failure
    pub fn is_failure(&self) -> bool {
        matches!(self, ProviderStatus::Unhealthy | ProviderStatus::Error)
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One registered external data provider
///
/// Immutable once loaded: the registry validates entries at load time and
/// replaces the whole map atomically on reload, never mutating in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// Unique id across the whole registry (injected from the map key if absent)
    #[serde(default)]
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Base URL of the provider's API
    pub base_url: String,

    /// Health check endpoint; may contain an `{api_key}` placeholder
    pub health_endpoint: String,

    /// How credentials are attached to the health request
    #[serde(default)]
    pub auth_type: AuthType,

    /// Header name used when `auth_type` is `api_key`
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Requests per minute the provider allows
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,

    /// Priority for failover ordering, 0-100 (higher is preferred)
    #[serde(default = "default_priority")]
    pub priority_score: u8,

    /// Data category
    #[serde(default)]
    pub category: Category,

    /// Free-tier limits, opaque to the monitor
    #[serde(default)]
    pub free_tier_limits: HashMap<String, String>,

    /// Environment variables that may hold a credential; the first one
    /// present in the process environment wins
    #[serde(default)]
    pub required_env_keys: Vec<String>,
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

fn default_priority() -> u8 {
    50
}

impl ProviderConfig {
    /// Validate invariants that serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        if self.id.is_empty() {
            return Err(crate::Error::invalid_provider(
                "<unknown>",
                "id cannot be empty",
            ));
        }
        if self.name.is_empty() {
            return Err(crate::Error::invalid_provider(&self.id, "name cannot be empty"));
        }
        if self.base_url.is_empty() {
            return Err(crate::Error::invalid_provider(
                &self.id,
                "base_url cannot be empty",
            ));
        }
        if self.health_endpoint.is_empty() {
            return Err(crate::Error::invalid_provider(
                &self.id,
                "health_endpoint cannot be empty",
            ));
        }
        if self.priority_score > 100 {
            return Err(crate::Error::invalid_provider(
                &self.id,
                format!("priority_score {} out of range 0-100", self.priority_score),
            ));
        }
        Ok(())
    }

    /// Full URL of the health endpoint (placeholder not yet substituted)
    pub fn health_url(&self) -> String {
        if self.health_endpoint.starts_with("http://") || self.health_endpoint.starts_with("https://")
        {
            self.health_endpoint.clone()
        } else {
            format!(
                "{}/{}",
                self.base_url.trim_end_matches('/'),
                self.health_endpoint.trim_start_matches('/')
            )
        }
    }
}

/// Immutable record of a single probe attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthRecord {
    /// Provider this record belongs to
    pub provider_id: String,
    /// Classified outcome
    pub status: ProviderStatus,
    /// Wall-clock time of the check
    pub timestamp: DateTime<Utc>,
    /// Seconds spent on the full attempt sequence, including retries
    pub response_time: Option<f64>,
    /// HTTP status code, if a response was received
    pub http_status: Option<u16>,
    /// Error message, if any
    pub error: Option<String>,
}

impl HealthRecord {
    /// Create a healthy record
    pub fn healthy(provider_id: impl Into<String>, response_time: f64, http_status: u16) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: ProviderStatus::Healthy,
            timestamp: Utc::now(),
            response_time: Some(response_time),
            http_status: Some(http_status),
            error: None,
        }
    }

    /// Create an unhealthy record (server-side HTTP failure)
    pub fn unhealthy(
        provider_id: impl Into<String>,
        response_time: f64,
        http_status: u16,
        error: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: ProviderStatus::Unhealthy,
            timestamp: Utc::now(),
            response_time: Some(response_time),
            http_status: Some(http_status),
            error: Some(error.into()),
        }
    }

    /// Create an error record
    pub fn error(provider_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: ProviderStatus::Error,
            timestamp: Utc::now(),
            response_time: None,
            http_status: None,
            error: Some(error.into()),
        }
    }

    /// Create a breaker-open record (no network call was made)
    pub fn circuit_open(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: ProviderStatus::CircuitBreakerOpen,
            timestamp: Utc::now(),
            response_time: None,
            http_status: None,
            error: Some("circuit breaker open".to_string()),
        }
    }

    /// Attach a response time measured around the whole attempt sequence
    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time = Some(seconds);
        self
    }

    /// Attach an HTTP status code
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }
}

/// Current status of a provider as stored in the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSnapshot {
    /// Provider id
    pub provider_id: String,
    /// Last classified outcome
    pub status: ProviderStatus,
    /// When the last check ran
    pub last_check: DateTime<Utc>,
    /// Response time of the last check, seconds
    pub response_time: Option<f64>,
    /// HTTP status of the last check
    pub http_status: Option<u16>,
    /// Error message of the last check
    pub error: Option<String>,
}

impl From<&HealthRecord> for HealthSnapshot {
    fn from(record: &HealthRecord) -> Self {
        Self {
            provider_id: record.provider_id.clone(),
            status: record.status,
            last_check: record.timestamp,
            response_time: record.response_time,
            http_status: record.http_status,
            error: record.error.clone(),
        }
    }
}

/// Derived rolling-window summary; recomputed on read, never authoritative
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSummary {
    /// Percentage of healthy checks over the window, 0-100
    pub uptime_percentage: f64,
    /// Weighted composite score over the window, 0-100
    pub health_score: f64,
    /// Average response time over the detailed history, seconds
    pub average_response_time: Option<f64>,
    /// Failures (unhealthy/error/breaker-open) in the window
    pub recent_failure_count: u64,
}

/// Per-provider health view returned by the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Provider id
    pub provider_id: String,
    /// Last known status
    pub status: ProviderStatus,
    /// When the last check ran
    pub last_check: Option<DateTime<Utc>>,
    /// Response time of the last check, seconds
    pub response_time: Option<f64>,
    /// Error message of the last check
    pub error_message: Option<String>,
    /// Uptime percentage over the rolling window
    pub uptime_percentage: f64,
}
