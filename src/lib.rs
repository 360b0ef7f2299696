//! vulnpipe - asynchronous vulnerability-analysis pipeline
//!
//! Accepts batches of software/asset identifiers, queries an external
//! vulnerability database under a shared rate limit, matches the returned
//! records against the submitted assets, aggregates a risk score, and
//! persists an idempotent result keyed by job id.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **Domain Layer** (`risk_analysis`): validated value objects and the
//!   pure matching/aggregation services
//! - **Application Layer** (`application`): producer, job ledger, and the
//!   worker pool driving the per-job state machine
//! - **Ports** (`ports`): capability traits for the broker, the result
//!   store, and the external vulnerability database
//! - **Adapters** (`adapters`): reqwest/governor-backed network adapters,
//!   in-process broker and store, and the axum control surface
//! - **Shared** (`shared`): error taxonomy and common result alias
//!
//! # Example
//!
//! ```no_run
//! use vulnpipe::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let config = Config::default();
//!
//! let queue = Arc::new(InMemoryJobQueue::new());
//! let ledger = Arc::new(JobLedger::new());
//! let producer = Producer::new(queue.clone(), ledger.clone());
//!
//! let job_id = producer.enqueue(vec!["nginx:1.18.0".to_string()]).await?;
//! println!("queued {job_id} ({} workers)", config.workers);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod config;
pub mod ports;
pub mod risk_analysis;
pub mod shared;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::inbound::{create_router, AppState};
    pub use crate::adapters::outbound::memory::{InMemoryJobQueue, InMemoryResultStore};
    pub use crate::adapters::outbound::network::{
        NvdApiClient, RateLimiter, RetryPolicy, VulnerabilityClient,
    };
    pub use crate::application::{JobLedger, JobState, Producer, WorkerPool};
    pub use crate::application::worker::{PipelineServices, WorkerConfig};
    pub use crate::cli::Args;
    pub use crate::config::Config;
    pub use crate::ports::outbound::{
        Delivery, JobQueue, QueueStatus, ResultStore, VulnerabilityPage, VulnerabilitySource,
    };
    pub use crate::risk_analysis::domain::{
        AnalysisJob, AnalysisResult, AssetRiskAnalysis, CvssScore, OverallRiskScore, Severity,
        Target, VulnerabilityRecord,
    };
    pub use crate::risk_analysis::services::{Matcher, RiskAggregator, RiskThresholds};
    pub use crate::shared::{ErrorCategory, PipelineError, Result};
}
