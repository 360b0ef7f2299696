use crate::risk_analysis::domain::Target;
use crate::shared::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of targets accepted in a single analysis job.
pub const MAX_BATCH_TARGETS: usize = 100;

/// The unit of work carried by the job queue.
///
/// Created by the producer, mutated only by the worker pool
/// (`attempt_count` is incremented on each redelivery), and removed from
/// the queue by acknowledgment after terminal success or dead-lettering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub job_id: String,
    pub targets: Vec<Target>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt_count: u32,
}

impl AnalysisJob {
    pub fn new(job_id: String, targets: Vec<Target>) -> Self {
        Self {
            job_id,
            targets,
            submitted_at: Utc::now(),
            attempt_count: 0,
        }
    }

    /// Payload validation performed before any external call is made.
    /// A failing job is dead-lettered as `malformed_job`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.job_id.trim().is_empty() {
            return Err(PipelineError::MalformedJob {
                reason: "job_id must not be empty".to_string(),
            });
        }
        if self.targets.is_empty() {
            return Err(PipelineError::MalformedJob {
                reason: "target list must not be empty".to_string(),
            });
        }
        if self.targets.len() > MAX_BATCH_TARGETS {
            return Err(PipelineError::MalformedJob {
                reason: format!(
                    "target list has {} entries, maximum allowed is {}",
                    self.targets.len(),
                    MAX_BATCH_TARGETS
                ),
            });
        }
        Ok(())
    }
}
