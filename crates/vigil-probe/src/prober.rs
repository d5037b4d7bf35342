//! Single-provider probe execution

use crate::gate::BreakerGate;
use crate::validate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vigil_core::{AuthType, HealthRecord, MonitorSettings, ProviderConfig};

const API_KEY_PLACEHOLDER: &str = "{api_key}";

/// Probe tunables
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeConfig {
    /// HTTP attempts per check (first try + retries)
    pub retry_attempts: u32,
    /// Hard timeout per HTTP attempt
    pub probe_timeout: Duration,
    /// Base unit for exponential backoff between retries
    pub backoff_base: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            probe_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl From<&MonitorSettings> for ProbeConfig {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            retry_attempts: settings.retry_attempts,
            probe_timeout: settings.probe_timeout,
            ..Default::default()
        }
    }
}

/// Executes health checks against individual providers
///
/// Every call to [`check`](Prober::check) returns a record; failures are
/// classified, never propagated.
#[derive(Debug, Clone)]
pub struct Prober<G: BreakerGate> {
    client: reqwest::Client,
    config: ProbeConfig,
    gate: G,
}

impl<G: BreakerGate> Prober<G> {
    /// Create a prober over a breaker gate
    pub fn new(gate: G, config: ProbeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            gate,
        }
    }

    /// The probe configuration
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Run one health check
    pub async fn check(&self, provider: &ProviderConfig) -> HealthRecord {
        let id = provider.id.as_str();

        if self.gate.is_open(id).await {
            debug!(provider_id = id, "Circuit breaker open, skipping probe");
            return HealthRecord::circuit_open(id);
        }

        let credential = vigil_registry::credentials::resolve_credential(provider);

        let url_template = provider.health_url();
        let url = if url_template.contains(API_KEY_PLACEHOLDER) {
            let Some((_, value)) = &credential else {
                warn!(provider_id = id, "No credential available for {{api_key}} substitution");
                return HealthRecord::error(id, "missing credential for {api_key} placeholder");
            };
            url_template.replace(API_KEY_PLACEHOLDER, value)
        } else {
            url_template
        };

        let headers = match build_auth_headers(provider, credential.as_ref()) {
            Ok(headers) => headers,
            Err(message) => {
                warn!(provider_id = id, error = %message, "Cannot authenticate probe");
                return HealthRecord::error(id, message);
            }
        };

        let start = Instant::now();
        self.execute(provider, &url, headers, start).await
    }

    async fn execute(
        &self,
        provider: &ProviderConfig,
        url: &str,
        headers: HeaderMap,
        start: Instant,
    ) -> HealthRecord {
        let id = provider.id.as_str();
        let mut last_error = String::new();

        for attempt in 0..self.config.retry_attempts {
            if attempt > 0 {
                let backoff = self.config.backoff_base * 2u32.pow(attempt);
                debug!(provider_id = id, attempt, backoff = ?backoff, "Retrying probe");
                tokio::time::sleep(backoff).await;
            }

            let result = self
                .client
                .get(url)
                .headers(headers.clone())
                .timeout(self.config.probe_timeout)
                .send()
                .await;

            match result {
                Ok(response) => return self.classify(provider, response, start).await,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_error = e.to_string();
                    warn!(
                        provider_id = id,
                        attempt,
                        error = %last_error,
                        "Transient probe failure"
                    );
                }
                Err(e) => {
                    // Non-transient client failure; retrying cannot help
                    return HealthRecord::error(id, format!("request failed: {e}"))
                        .with_response_time(start.elapsed().as_secs_f64());
                }
            }
        }

        HealthRecord::error(
            id,
            format!(
                "all {} attempts failed: {last_error}",
                self.config.retry_attempts
            ),
        )
        .with_response_time(start.elapsed().as_secs_f64())
    }

    async fn classify(
        &self,
        provider: &ProviderConfig,
        response: reqwest::Response,
        start: Instant,
    ) -> HealthRecord {
        let id = provider.id.as_str();
        let status = response.status();
        let code = status.as_u16();

        if status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    return HealthRecord::error(id, format!("failed to read body: {e}"))
                        .with_response_time(start.elapsed().as_secs_f64())
                        .with_http_status(code);
                }
            };
            let elapsed = start.elapsed().as_secs_f64();

            return match validate::validate_body(provider.category, &body) {
                Ok(()) => {
                    debug!(provider_id = id, response_time = elapsed, "Probe healthy");
                    HealthRecord::healthy(id, elapsed, code)
                }
                Err(reason) => {
                    warn!(provider_id = id, reason = %reason, "Response validation failed");
                    HealthRecord::error(id, format!("validation failed: {reason}"))
                        .with_response_time(elapsed)
                        .with_http_status(code)
                }
            };
        }

        let elapsed = start.elapsed().as_secs_f64();

        if code == 429 {
            warn!(provider_id = id, "Provider rate-limited the probe");
            return HealthRecord::error(id, "rate limited (HTTP 429)")
                .with_response_time(elapsed)
                .with_http_status(code);
        }

        if status.is_server_error() {
            warn!(provider_id = id, http_status = code, "Provider returned server error");
            return HealthRecord::unhealthy(id, elapsed, code, format!("HTTP {code}"));
        }

        warn!(provider_id = id, http_status = code, "Provider rejected the probe");
        HealthRecord::error(id, format!("HTTP {code}"))
            .with_response_time(elapsed)
            .with_http_status(code)
    }
}

fn build_auth_headers(
    provider: &ProviderConfig,
    credential: Option<&(String, String)>,
) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();

    if provider.auth_type == AuthType::None {
        return Ok(headers);
    }

    let Some((_, value)) = credential else {
        return Err(format!(
            "no credential found in environment for auth type '{}'",
            provider.auth_type
        ));
    };

    match provider.auth_type {
        AuthType::None => {}
        AuthType::ApiKey => {
            let name = HeaderName::from_bytes(provider.api_key_header.as_bytes())
                .map_err(|e| format!("invalid api_key_header: {e}"))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| format!("credential is not a valid header value: {e}"))?;
            headers.insert(name, value);
        }
        AuthType::Bearer => {
            let value = HeaderValue::from_str(&format!("Bearer {value}"))
                .map_err(|e| format!("credential is not a valid header value: {e}"))?;
            headers.insert(AUTHORIZATION, value);
        }
        AuthType::Basic => {
            let value = HeaderValue::from_str(&format!("Basic {value}"))
                .map_err(|e| format!("credential is not a valid header value: {e}"))?;
            headers.insert(AUTHORIZATION, value);
        }
    }

    Ok(headers)
}
