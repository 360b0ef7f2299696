use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Classification of a pipeline failure.
///
/// Every error that reaches the worker boundary is mapped into exactly one
/// of these categories; the category alone decides whether a job is
/// requeued or dead-lettered. The control surface reports the category for
/// dead-lettered jobs instead of internal error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Timeouts, connection resets, 5xx responses from external systems.
    TransientNetwork,
    /// The external vulnerability database rejected the request for rate
    /// limiting (distinct from the local rate limiter, which never errors).
    ExternalRateLimited,
    /// 4xx other than rate limit, or an unparseable response. Not retried.
    PermanentRequest,
    /// Job payload missing required fields or carrying an invalid target
    /// list. Dead-lettered without any external calls.
    MalformedJob,
    /// The result store rejected a write after the analysis was computed.
    Persistence,
}

impl ErrorCategory {
    /// Whether a failure in this category may succeed on a later attempt.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorCategory::TransientNetwork
                | ErrorCategory::ExternalRateLimited
                | ErrorCategory::Persistence
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::TransientNetwork => "transient_network",
            ErrorCategory::ExternalRateLimited => "external_rate_limited",
            ErrorCategory::PermanentRequest => "permanent_request",
            ErrorCategory::MalformedJob => "malformed_job",
            ErrorCategory::Persistence => "persistence",
        };
        write!(f, "{}", name)
    }
}

/// Error taxonomy for the analysis pipeline.
///
/// Uses thiserror to derive Display and Error traits automatically,
/// reducing boilerplate while keeping operator-readable messages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("connection to vulnerability database failed: {details}")]
    Connection { details: String },

    #[error("vulnerability database returned server error {status}")]
    UpstreamServer { status: u16 },

    #[error("vulnerability database rejected the request for rate limiting (status {status})")]
    UpstreamRateLimited { status: u16 },

    #[error("vulnerability database rejected the request with status {status}: {details}")]
    BadRequest { status: u16, details: String },

    #[error("failed to decode vulnerability database response: {details}")]
    MalformedResponse { details: String },

    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("malformed job payload: {reason}")]
    MalformedJob { reason: String },

    #[error("result store write failed for job {job_id}: {details}")]
    Persistence { job_id: String, details: String },

    #[error("queue operation failed: {details}")]
    Queue { details: String },
}

impl PipelineError {
    /// Maps this error into the retry taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::Timeout { .. }
            | PipelineError::Connection { .. }
            | PipelineError::UpstreamServer { .. }
            | PipelineError::Queue { .. } => ErrorCategory::TransientNetwork,
            PipelineError::UpstreamRateLimited { .. } => ErrorCategory::ExternalRateLimited,
            PipelineError::BadRequest { .. } | PipelineError::MalformedResponse { .. } => {
                ErrorCategory::PermanentRequest
            }
            PipelineError::RetriesExhausted { source, .. } => source.category(),
            PipelineError::MalformedJob { .. } => ErrorCategory::MalformedJob,
            PipelineError::Persistence { .. } => ErrorCategory::Persistence,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.category().is_transient()
    }
}
