use crate::shared::ErrorCategory;
use dashmap::DashMap;
use serde::Serialize;

/// Observable lifecycle state of a job, backing the control surface's
/// `pending` / `failed` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum JobState {
    Queued,
    InFlight,
    Completed,
    Failed { category: ErrorCategory },
}

impl JobState {
    /// Whether the job is still making progress (including retries).
    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Queued | JobState::InFlight)
    }
}

/// Thread-safe registry of job states, shared between the producer, the
/// worker pool, and the HTTP surface.
#[derive(Debug, Default)]
pub struct JobLedger {
    states: DashMap<String, JobState>,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_queued(&self, job_id: &str) {
        self.states.insert(job_id.to_string(), JobState::Queued);
    }

    pub fn mark_in_flight(&self, job_id: &str) {
        self.states.insert(job_id.to_string(), JobState::InFlight);
    }

    pub fn mark_completed(&self, job_id: &str) {
        self.states.insert(job_id.to_string(), JobState::Completed);
    }

    pub fn mark_failed(&self, job_id: &str, category: ErrorCategory) {
        self.states
            .insert(job_id.to_string(), JobState::Failed { category });
    }

    pub fn get(&self, job_id: &str) -> Option<JobState> {
        self.states.get(job_id).map(|entry| *entry)
    }
}
