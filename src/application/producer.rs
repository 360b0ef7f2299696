use crate::application::JobLedger;
use crate::ports::outbound::JobQueue;
use crate::risk_analysis::domain::{AnalysisJob, Target};
use crate::shared::PipelineError;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Accepts analysis requests and enqueues jobs for the worker pool.
///
/// The producer assigns the job id, validates the payload before it ever
/// reaches the queue, and records the job as queued in the ledger.
pub struct Producer {
    queue: Arc<dyn JobQueue>,
    ledger: Arc<JobLedger>,
}

impl Producer {
    pub fn new(queue: Arc<dyn JobQueue>, ledger: Arc<JobLedger>) -> Self {
        Self { queue, ledger }
    }

    /// Builds and enqueues an `AnalysisJob` from raw target strings.
    ///
    /// # Errors
    /// Returns `MalformedJob` when a target fails validation or the batch
    /// is empty/oversized; queue failures propagate as `Queue` errors.
    pub async fn enqueue(&self, raw_targets: Vec<String>) -> Result<String, PipelineError> {
        let mut targets = Vec::with_capacity(raw_targets.len());
        for raw in raw_targets {
            let target = Target::new(raw).map_err(|e| PipelineError::MalformedJob {
                reason: e.to_string(),
            })?;
            targets.push(target);
        }

        let job = AnalysisJob::new(Uuid::new_v4().to_string(), targets);
        job.validate()?;

        let job_id = job.job_id.clone();
        self.queue.publish(job).await?;
        self.ledger.mark_queued(&job_id);
        info!(job_id = %job_id, "analysis job enqueued");
        Ok(job_id)
    }
}
