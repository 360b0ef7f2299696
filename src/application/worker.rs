use crate::adapters::outbound::network::VulnerabilityClient;
use crate::application::JobLedger;
use crate::ports::outbound::{Delivery, JobQueue, ResultStore};
use crate::risk_analysis::domain::{AnalysisJob, AnalysisResult, VulnerabilityRecord};
use crate::risk_analysis::services::{Matcher, RiskAggregator};
use crate::shared::{ErrorCategory, PipelineError};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Stage of the per-job state machine, used for structured transition
/// events and error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Received,
    Fetching,
    Matching,
    Aggregating,
    Persisting,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStage::Received => "received",
            JobStage::Fetching => "fetching",
            JobStage::Matching => "matching",
            JobStage::Aggregating => "aggregating",
            JobStage::Persisting => "persisting",
        };
        write!(f, "{}", name)
    }
}

/// Disposition of a failed delivery, decided by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Requeue { delay: Duration },
    DeadLetter { category: ErrorCategory },
}

/// Knobs governing the worker pool and its retry state machine.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub workers: usize,
    /// Retry ceiling: total deliveries attempted per job.
    pub max_retries: u32,
    /// Requeue backoff seed; delivery n+1 waits `retry_delay * 2^n`.
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    /// Cap on vulnerability records fetched per job across all targets.
    pub max_records_per_job: usize,
}

/// All collaborators of the pipeline, constructed once at startup and
/// handed to the worker pool. No hidden global state.
pub struct PipelineServices {
    pub queue: Arc<dyn JobQueue>,
    pub store: Arc<dyn ResultStore>,
    pub client: VulnerabilityClient,
    pub matcher: Matcher,
    pub aggregator: RiskAggregator,
    pub ledger: Arc<JobLedger>,
}

/// Fixed-size pool of workers consuming the job queue.
///
/// Each worker pulls one job at a time and drives it through the state
/// machine RECEIVED -> FETCHING -> MATCHING -> AGGREGATING -> PERSISTING,
/// acknowledging to the broker only after the result store write has
/// succeeded. Failures are classified at this boundary and either requeued
/// with backoff or dead-lettered; nothing escapes unclassified.
pub struct WorkerPool {
    config: WorkerConfig,
    services: Arc<PipelineServices>,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig, services: PipelineServices) -> Self {
        Self {
            config,
            services: Arc::new(services),
        }
    }

    /// Runs the pool until `shutdown` flips to true or the queue closes.
    /// Workers finish their in-flight job before exiting; unacked jobs
    /// remain on the queue for redelivery.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let mut handles = Vec::with_capacity(self.config.workers);
        for worker_id in 0..self.config.workers {
            let services = Arc::clone(&self.services);
            let config = self.config.clone();
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                        delivery = services.queue.pull() => {
                            match delivery {
                                None => break,
                                Some(delivery) => {
                                    handle_delivery(&services, &config, delivery).await;
                                }
                            }
                        }
                    }
                }
                debug!(worker_id, "worker exited");
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

/// Decides what to do with a delivery that failed with `error`.
///
/// Permanent failures dead-letter immediately. Transient failures requeue
/// with exponential backoff until the delivery that would exceed the
/// retry ceiling, which dead-letters instead so jobs are never retried
/// forever.
pub fn decide_outcome(error: &PipelineError, attempt_count: u32, config: &WorkerConfig) -> JobOutcome {
    let category = error.category();
    if !category.is_transient() {
        return JobOutcome::DeadLetter { category };
    }
    if attempt_count + 1 >= config.max_retries {
        return JobOutcome::DeadLetter { category };
    }
    let exp = attempt_count.min(16);
    let delay = config
        .retry_delay
        .saturating_mul(1u32 << exp)
        .min(config.max_retry_delay);
    JobOutcome::Requeue { delay }
}

async fn handle_delivery(services: &PipelineServices, config: &WorkerConfig, delivery: Delivery) {
    let job_id = delivery.job.job_id.clone();
    let attempt = delivery.job.attempt_count;
    services.ledger.mark_in_flight(&job_id);
    info!(
        job_id = %job_id,
        attempt,
        targets = delivery.job.targets.len(),
        "job received"
    );

    match process_job(services, config, &delivery.job).await {
        Ok(result) => {
            match services.queue.ack(delivery).await {
                Ok(()) => {
                    services.ledger.mark_completed(&job_id);
                    info!(
                        job_id = %job_id,
                        overall_score = result.overall.value,
                        overall_level = %result.overall.level,
                        "job acked"
                    );
                }
                Err(e) => {
                    // The result is persisted; the broker will redeliver
                    // and the idempotent store makes the replay a no-op.
                    warn!(job_id = %job_id, error = %e, "ack failed after persist");
                }
            }
        }
        Err(e) => {
            let category = e.category();
            warn!(
                job_id = %job_id,
                attempt,
                category = %category,
                error = %e,
                "job stage failed"
            );
            match decide_outcome(&e, attempt, config) {
                JobOutcome::Requeue { delay } => {
                    services.ledger.mark_queued(&job_id);
                    match services.queue.requeue(delivery, delay).await {
                        Ok(()) => info!(
                            job_id = %job_id,
                            delay_ms = delay.as_millis() as u64,
                            next_attempt = attempt + 1,
                            "job requeued"
                        ),
                        Err(e) => {
                            error!(job_id = %job_id, error = %e, "requeue failed");
                        }
                    }
                }
                JobOutcome::DeadLetter { category } => {
                    if category == ErrorCategory::Persistence {
                        // A result was computed but could not be saved.
                        error!(
                            job_id = %job_id,
                            "computed result could not be persisted; job dead-lettered"
                        );
                    }
                    services.ledger.mark_failed(&job_id, category);
                    match services.queue.dead_letter(delivery, category).await {
                        Ok(()) => warn!(
                            job_id = %job_id,
                            category = %category,
                            "job dead-lettered"
                        ),
                        Err(e) => {
                            error!(job_id = %job_id, error = %e, "dead-letter failed");
                        }
                    }
                }
            }
        }
    }
}

/// Drives one job through the compute stages. Validation happens before
/// any external call; the store write is the final stage so that a crash
/// before ack can only cause an idempotent replay.
async fn process_job(
    services: &PipelineServices,
    config: &WorkerConfig,
    job: &AnalysisJob,
) -> Result<AnalysisResult, PipelineError> {
    job.validate()?;

    debug!(job_id = %job.job_id, stage = %JobStage::Fetching, "stage entered");
    let records = fetch_records(services, config, job).await?;

    debug!(job_id = %job.job_id, stage = %JobStage::Matching, "stage entered");
    let matches = services.matcher.match_targets(&job.targets, &records);

    debug!(job_id = %job.job_id, stage = %JobStage::Aggregating, "stage entered");
    let (asset_analyses, overall) = services.aggregator.aggregate(matches);

    let result = AnalysisResult {
        job_id: job.job_id.clone(),
        asset_analyses,
        overall,
        completed_at: Utc::now(),
    };

    debug!(job_id = %job.job_id, stage = %JobStage::Persisting, "stage entered");
    services
        .store
        .put(result.clone())
        .await
        .map_err(|e| PipelineError::Persistence {
            job_id: job.job_id.clone(),
            details: e.to_string(),
        })?;

    Ok(result)
}

/// Fetches records for every distinct lookup key in the job, deduplicated
/// by record id, bounded by the per-job record cap. Lookup results are
/// only reused within this one job.
async fn fetch_records(
    services: &PipelineServices,
    config: &WorkerConfig,
    job: &AnalysisJob,
) -> Result<Vec<VulnerabilityRecord>, PipelineError> {
    let mut records: Vec<VulnerabilityRecord> = Vec::new();
    let mut seen_queries: HashSet<String> = HashSet::new();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for target in &job.targets {
        let query = target.product();
        if query.is_empty() || !seen_queries.insert(query.clone()) {
            continue;
        }
        let remaining = config.max_records_per_job.saturating_sub(records.len());
        if remaining == 0 {
            break;
        }
        let stream = services.client.lookup(&query).take(remaining);
        futures::pin_mut!(stream);
        while let Some(record) = stream.try_next().await? {
            if seen_ids.insert(record.id.clone()) {
                records.push(record);
            }
        }
    }

    Ok(records)
}
