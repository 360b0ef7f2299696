pub mod analysis;
pub mod job;
pub mod target;
pub mod vulnerability;

pub use analysis::{AnalysisResult, AssetRiskAnalysis, OverallRiskScore};
pub use job::{AnalysisJob, MAX_BATCH_TARGETS};
pub use target::Target;
pub use vulnerability::{CvssScore, Severity, VulnerabilityRecord};
