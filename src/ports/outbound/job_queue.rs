use crate::risk_analysis::domain::AnalysisJob;
use crate::shared::{ErrorCategory, PipelineError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Snapshot of queue depths for the control surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Jobs waiting for a worker, including delayed requeues.
    pub depth: usize,
    /// Jobs delivered to a worker but not yet acked or requeued.
    pub in_flight: usize,
    /// Jobs terminally failed and preserved for inspection.
    pub dead_letter: usize,
}

/// One delivery of a job to a worker. The tag identifies the delivery for
/// acknowledgment, the way broker delivery tags do.
#[derive(Debug)]
pub struct Delivery {
    pub job: AnalysisJob,
    pub tag: u64,
}

/// JobQueue port: the message-broker contract the pipeline consumes.
///
/// The broker guarantees at-least-once delivery with manual
/// acknowledgment: a job delivered to a worker stays owned by the broker
/// until it is acked (removed), requeued (redelivered later with an
/// incremented `attempt_count`), or dead-lettered (removed from the live
/// queue but preserved with its failure category).
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues a job. The producer side of the contract.
    async fn publish(&self, job: AnalysisJob) -> Result<(), PipelineError>;

    /// Blocks until a job is available, returning `None` once the queue
    /// has been closed for shutdown.
    async fn pull(&self) -> Option<Delivery>;

    /// Positive acknowledgment: the job is done and must not be
    /// redelivered.
    async fn ack(&self, delivery: Delivery) -> Result<(), PipelineError>;

    /// Negative acknowledgment: redeliver after `delay` with
    /// `attempt_count` incremented.
    async fn requeue(&self, delivery: Delivery, delay: Duration) -> Result<(), PipelineError>;

    /// Terminal failure: remove from the live queue, preserve for
    /// inspection with the failure category.
    async fn dead_letter(
        &self,
        delivery: Delivery,
        category: ErrorCategory,
    ) -> Result<(), PipelineError>;

    async fn status(&self) -> QueueStatus;

    /// Removes all pending (not in-flight, not dead-lettered) jobs.
    /// Operational recovery only; returns the number of jobs removed.
    async fn purge(&self) -> Result<usize, PipelineError>;

    /// Wakes all blocked `pull` calls and makes future pulls return
    /// `None`. Pending jobs stay queued for redelivery after restart.
    fn close(&self);
}
