use anyhow::Context;
use std::process;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vulnpipe::adapters::inbound::{create_router, AppState};
use vulnpipe::adapters::outbound::memory::{InMemoryJobQueue, InMemoryResultStore};
use vulnpipe::adapters::outbound::network::{NvdApiClient, RateLimiter, VulnerabilityClient};
use vulnpipe::application::worker::{PipelineServices, WorkerConfig};
use vulnpipe::application::{JobLedger, Producer, WorkerPool};
use vulnpipe::cli::Args;
use vulnpipe::config::Config;
use vulnpipe::ports::outbound::{JobQueue, ResultStore, VulnerabilitySource};
use vulnpipe::risk_analysis::services::{Matcher, RiskAggregator};
use vulnpipe::shared::Result;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        for cause in e.chain().skip(1) {
            eprintln!("Caused by: {}", cause);
        }
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse_args();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    // Outbound adapters
    let source: Arc<dyn VulnerabilitySource> = Arc::new(NvdApiClient::new(
        config.vulndb_url.clone(),
        config.vulndb_api_key.clone(),
        config.request_timeout,
    )?);
    let limiter = RateLimiter::per_second(config.rate_limit_per_second)?;
    let client = VulnerabilityClient::new(
        source,
        limiter,
        config.retry_policy(),
        config.page_size,
        config.max_vulnerabilities_per_request,
    );
    let queue = Arc::new(InMemoryJobQueue::new());
    let store = Arc::new(InMemoryResultStore::new());
    let ledger = Arc::new(JobLedger::new());

    // Worker pool (Dependency Injection)
    let services = PipelineServices {
        queue: Arc::clone(&queue) as Arc<dyn JobQueue>,
        store: Arc::clone(&store) as Arc<dyn ResultStore>,
        client,
        matcher: Matcher::new(),
        aggregator: RiskAggregator::new(config.risk_thresholds),
        ledger: Arc::clone(&ledger),
    };
    let pool = WorkerPool::new(
        WorkerConfig {
            workers: config.workers,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            max_retry_delay: config.max_retry_delay,
            max_records_per_job: config.max_vulnerabilities_per_request,
        },
        services,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool_handle = tokio::spawn(pool.run(shutdown_rx));

    // Control surface
    let producer = Arc::new(Producer::new(
        Arc::clone(&queue) as Arc<dyn JobQueue>,
        Arc::clone(&ledger),
    ));
    let state = AppState {
        producer,
        queue: Arc::clone(&queue) as Arc<dyn JobQueue>,
        store: Arc::clone(&store) as Arc<dyn ResultStore>,
        ledger,
        started_at: Instant::now(),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(
        addr = %config.listen_addr,
        workers = config.workers,
        rate_limit_per_second = config.rate_limit_per_second,
        "vulnpipe listening"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("control surface failed")?;

    // Workers finish their in-flight job; unacked jobs stay queued for
    // redelivery after restart.
    info!("shutting down, draining workers");
    let _ = shutdown_tx.send(true);
    queue.close();
    let _ = pool_handle.await;
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
