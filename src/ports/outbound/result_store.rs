use crate::risk_analysis::domain::AnalysisResult;
use crate::shared::PipelineError;
use async_trait::async_trait;

/// ResultStore port for durable, keyed storage of completed analyses.
///
/// Writes are keyed by `job_id` and idempotent: repeating a `put` with
/// equal content is a no-op, and a redelivered job overwriting with
/// different content is last-write-wins. The worker acknowledges a job to
/// the broker only after `put` has returned successfully.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn put(&self, result: AnalysisResult) -> Result<(), PipelineError>;

    async fn get(&self, job_id: &str) -> Result<Option<AnalysisResult>, PipelineError>;
}
