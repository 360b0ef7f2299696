use crate::risk_analysis::domain::{Severity, Target, VulnerabilityRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk assessment for a single asset within a job.
///
/// Computed once per job per asset and never mutated afterwards. The
/// `asset` is always drawn from the parent job's target list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRiskAnalysis {
    pub asset: Target,
    /// Matched records ordered by descending score, tie-broken by id.
    pub matched_records: Vec<VulnerabilityRecord>,
    /// Normalized 0-100 risk score.
    pub risk_score: f64,
    pub risk_level: Severity,
}

/// Aggregate risk for the whole job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallRiskScore {
    pub value: f64,
    pub level: Severity,
    pub recommendations: Vec<String>,
}

/// The sole unit written to the result store, keyed by `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub job_id: String,
    pub asset_analyses: Vec<AssetRiskAnalysis>,
    pub overall: OverallRiskScore,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Content equality ignoring `completed_at`.
    ///
    /// Used by the result store to make redelivered writes observably
    /// idempotent: a replay of the same deterministic computation differs
    /// only in its completion timestamp.
    pub fn content_eq(&self, other: &AnalysisResult) -> bool {
        self.job_id == other.job_id
            && self.asset_analyses == other.asset_analyses
            && self.overall == other.overall
    }
}
