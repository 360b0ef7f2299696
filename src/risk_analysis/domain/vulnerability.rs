use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity ordinal for vulnerability records and risk levels.
///
/// Ordering follows the derive: `Low < Medium < High < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Buckets a CVSS base score (0.0-10.0) into a severity, following the
    /// CVSS v3.1 qualitative rating scale.
    pub fn from_cvss_score(score: f64) -> Self {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// NewType wrapper for a CVSS base score, validated to 0.0-10.0.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CvssScore(f64);

impl CvssScore {
    pub fn new(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("CVSS score must be a finite number".to_string());
        }
        if !(0.0..=10.0).contains(&value) {
            return Err(format!(
                "CVSS score must be between 0.0 and 10.0, got {}",
                value
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for CvssScore {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        CvssScore::new(value)
    }
}

impl From<CvssScore> for f64 {
    fn from(score: CvssScore) -> Self {
        score.0
    }
}

/// A published vulnerability entry as returned by the external database.
///
/// Immutable once fetched; cached per lookup key only for the lifetime of
/// one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub id: String,
    pub description: String,
    pub severity: Severity,
    pub score: CvssScore,
    /// Platform identifiers this record applies to, e.g. `nginx:*` or
    /// `cpe:2.3:a:nginx:nginx:1.18.0`.
    pub affected_identifiers: Vec<String>,
    pub published_at: DateTime<Utc>,
}
