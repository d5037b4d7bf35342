//! Vigil CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vigil_core::MonitorSettings;
use vigil_ledger::{HealthLedger, LedgerConfig};
use vigil_metrics::MetricsCollector;
use vigil_monitor::api::{self, ApiState};
use vigil_monitor::{listen_for_signals, EventBus, Scheduler, ShutdownSignal};
use vigil_registry::{load_document, ProviderRegistry};
use vigil_state::{BackendConfig, InMemoryBackend, StateBackend};

/// How often the registry source is polled for changes
const RELOAD_POLL_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Provider health monitor and circuit breaker", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the monitor (scheduler + HTTP API)
    Serve {
        /// Path to the provider registry document
        #[arg(short, long, default_value = "providers.yaml")]
        registry: PathBuf,

        /// Address for the HTTP API
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        listen: SocketAddr,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long, default_value = "info")]
        log_level: String,
    },

    /// Validate a provider registry document
    Validate {
        /// Path to the provider registry document
        #[arg(short, long, default_value = "providers.yaml")]
        registry: PathBuf,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            registry,
            listen,
            log_level,
        } => {
            init_tracing(&log_level)?;

            info!("Starting Vigil provider health monitor");
            info!("Registry source: {}", registry.display());

            let (registry, document) = ProviderRegistry::load(&registry)?;
            let registry = Arc::new(registry);

            info!(
                providers = registry.len(),
                skipped = document.skipped,
                check_interval = ?document.settings.check_interval,
                "Registry loaded"
            );

            match document.backend {
                BackendConfig::Memory => {
                    let backend = InMemoryBackend::with_cleanup(Duration::from_secs(60));
                    run_server(backend, registry, document.settings, listen).await
                }
                #[cfg(feature = "redis-backend")]
                BackendConfig::Redis { url, prefix } => {
                    let backend = match prefix {
                        Some(prefix) => {
                            vigil_state::RedisBackend::with_prefix(&url, prefix).await?
                        }
                        None => vigil_state::RedisBackend::new(&url).await?,
                    };
                    info!("Connected to Redis state backend");
                    run_server(backend, registry, document.settings, listen).await
                }
                #[cfg(not(feature = "redis-backend"))]
                BackendConfig::Redis { .. } => anyhow::bail!(
                    "registry requests the redis backend, but this build lacks the \
                     'redis-backend' feature"
                ),
            }
        }

        Commands::Validate { registry } => {
            tracing_subscriber::fmt().with_target(false).init();

            info!("Validating registry document: {}", registry.display());

            match load_document(&registry) {
                Ok(document) => {
                    info!("✓ Registry document is valid");
                    info!("  Providers: {}", document.providers.len());
                    info!("  Skipped entries: {}", document.skipped);
                    info!("  Check interval: {:?}", document.settings.check_interval);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Registry validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("Vigil provider health monitor");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

async fn run_server<B: StateBackend>(
    backend: B,
    registry: Arc<ProviderRegistry>,
    settings: MonitorSettings,
    listen: SocketAddr,
) -> Result<()> {
    let ledger = HealthLedger::new(backend, LedgerConfig::from(&settings));
    ledger.ping().await?;

    let metrics = MetricsCollector::new();
    let events = EventBus::default();
    let scheduler = Scheduler::new(
        registry.clone(),
        ledger.clone(),
        metrics.clone(),
        events,
        settings,
    );

    let shutdown = ShutdownSignal::new();
    tokio::spawn(listen_for_signals(shutdown.clone()));

    spawn_registry_reloader(scheduler.clone(), shutdown.clone());

    let scheduler_task = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    let state = ApiState {
        scheduler,
        registry,
        ledger,
        metrics,
    };
    api::serve(state, listen, shutdown).await?;

    scheduler_task.await?;
    info!("Monitor stopped");
    Ok(())
}

fn spawn_registry_reloader<B: StateBackend>(scheduler: Scheduler<B>, shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        let mut rx = shutdown.subscribe();
        let mut timer = tokio::time::interval(RELOAD_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = timer.tick() => {
                    match scheduler.reload_registry() {
                        Ok(true) => info!("Registry reloaded"),
                        Ok(false) => {}
                        Err(e) => warn!(error = %e, "Registry reload failed"),
                    }
                }
                _ = rx.recv() => break,
            }
        }
    });
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(filter.into()),
        )
        .init();

    Ok(())
}
