use crate::risk_analysis::domain::{
    AssetRiskAnalysis, OverallRiskScore, Severity, Target, VulnerabilityRecord,
};
use crate::shared::Result;

/// Score bucketing thresholds on the normalized 0-100 scale.
///
/// A score below `low` is LOW, below `medium` is MEDIUM, below `high` is
/// HIGH, and anything at or above `high` is CRITICAL. The thresholds are
/// configuration, not part of the algorithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskThresholds {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 25.0,
            medium: 50.0,
            high: 75.0,
        }
    }
}

impl RiskThresholds {
    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.low && self.low < self.medium && self.medium < self.high) {
            anyhow::bail!(
                "Risk thresholds must satisfy 0 < low < medium < high, got {} / {} / {}",
                self.low,
                self.medium,
                self.high
            );
        }
        Ok(())
    }

    pub fn level(&self, score: f64) -> Severity {
        if score < self.low {
            Severity::Low
        } else if score < self.medium {
            Severity::Medium
        } else if score < self.high {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

/// Boost added per matched record beyond the first.
const COUNT_BOOST_STEP: f64 = 5.0;
/// Ceiling on the count boost.
const COUNT_BOOST_MAX: f64 = 20.0;

/// Reduces matched vulnerabilities into per-asset and overall risk.
///
/// All aggregation functions are pure and total: the empty-match case
/// yields score 0, level LOW, and no recommendations.
#[derive(Debug, Clone)]
pub struct RiskAggregator {
    thresholds: RiskThresholds,
}

impl RiskAggregator {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    /// Computes one `AssetRiskAnalysis` per matched target plus the
    /// aggregate `OverallRiskScore` for the job.
    pub fn aggregate(
        &self,
        matches: Vec<(Target, Vec<VulnerabilityRecord>)>,
    ) -> (Vec<AssetRiskAnalysis>, OverallRiskScore) {
        let analyses: Vec<AssetRiskAnalysis> = matches
            .into_iter()
            .map(|(asset, matched_records)| {
                let risk_score = asset_score(&matched_records);
                AssetRiskAnalysis {
                    asset,
                    risk_level: self.thresholds.level(risk_score),
                    risk_score,
                    matched_records,
                }
            })
            .collect();

        let value = analyses
            .iter()
            .map(|a| a.risk_score)
            .fold(0.0_f64, f64::max);

        let overall = OverallRiskScore {
            value,
            level: self.thresholds.level(value),
            recommendations: recommendations(&analyses),
        };

        (analyses, overall)
    }
}

/// Per-asset score: weighted maximum of matched CVSS scores (scaled to
/// 0-100) plus a count-based boost, clamped to 100. Monotonic in both the
/// maximum score and the number of matches.
fn asset_score(records: &[VulnerabilityRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let max_cvss = records
        .iter()
        .map(|r| r.score.value())
        .fold(0.0_f64, f64::max);
    let boost = ((records.len() as f64 - 1.0) * COUNT_BOOST_STEP).min(COUNT_BOOST_MAX);
    (max_cvss * 10.0 + boost).min(100.0)
}

/// Deterministic recommendations derived from which severity levels are
/// present among matched records, ordered most severe first.
fn recommendations(analyses: &[AssetRiskAnalysis]) -> Vec<String> {
    let mut has_critical = false;
    let mut has_high = false;
    let mut has_medium = false;

    for analysis in analyses {
        for record in &analysis.matched_records {
            match record.severity {
                Severity::Critical => has_critical = true,
                Severity::High => has_high = true,
                Severity::Medium => has_medium = true,
                Severity::Low => {}
            }
        }
    }

    let mut out = Vec::new();
    if has_critical {
        out.push("Patch critically vulnerable components immediately".to_string());
    }
    if has_high {
        out.push(
            "Schedule remediation of high-severity findings within the current patch window"
                .to_string(),
        );
    }
    if has_medium {
        out.push("Review medium-severity findings at the next maintenance cycle".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk_analysis::domain::CvssScore;
    use chrono::{TimeZone, Utc};

    fn target(raw: &str) -> Target {
        Target::new(raw.to_string()).unwrap()
    }

    fn record(id: &str, score: f64) -> VulnerabilityRecord {
        VulnerabilityRecord {
            id: id.to_string(),
            description: format!("{} description", id),
            severity: Severity::from_cvss_score(score),
            score: CvssScore::new(score).unwrap(),
            affected_identifiers: vec!["nginx:*".to_string()],
            published_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn aggregator() -> RiskAggregator {
        RiskAggregator::new(RiskThresholds::default())
    }

    #[test]
    fn test_empty_matches_yield_zero_low_no_recommendations() {
        let (analyses, overall) =
            aggregator().aggregate(vec![(target("unknown-pkg:0.0.1"), vec![])]);
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].risk_score, 0.0);
        assert_eq!(analyses[0].risk_level, Severity::Low);
        assert_eq!(overall.value, 0.0);
        assert_eq!(overall.level, Severity::Low);
        assert!(overall.recommendations.is_empty());
    }

    #[test]
    fn test_no_targets_is_total() {
        let (analyses, overall) = aggregator().aggregate(vec![]);
        assert!(analyses.is_empty());
        assert_eq!(overall.value, 0.0);
        assert_eq!(overall.level, Severity::Low);
        assert!(overall.recommendations.is_empty());
    }

    #[test]
    fn test_single_critical_record_drives_critical_level() {
        let (analyses, overall) = aggregator().aggregate(vec![(
            target("nginx:1.18.0"),
            vec![record("CVE-2024-0001", 9.8)],
        )]);
        assert_eq!(analyses[0].risk_score, 98.0);
        assert_eq!(analyses[0].risk_level, Severity::Critical);
        assert_eq!(overall.level, Severity::Critical);
        assert_eq!(
            overall.recommendations,
            vec!["Patch critically vulnerable components immediately".to_string()]
        );
    }

    #[test]
    fn test_count_boost_is_capped_and_clamped() {
        let records: Vec<VulnerabilityRecord> = (0..10)
            .map(|i| record(&format!("CVE-2024-{:04}", i), 5.0))
            .collect();
        let (analyses, _) = aggregator().aggregate(vec![(target("nginx:1.18.0"), records)]);
        // max 5.0 * 10 = 50, boost capped at 20
        assert_eq!(analyses[0].risk_score, 70.0);

        let records: Vec<VulnerabilityRecord> = (0..10)
            .map(|i| record(&format!("CVE-2024-{:04}", i), 9.8))
            .collect();
        let (analyses, _) = aggregator().aggregate(vec![(target("nginx:1.18.0"), records)]);
        assert_eq!(analyses[0].risk_score, 100.0);
    }

    #[test]
    fn test_score_monotonic_in_match_count() {
        let one = vec![record("CVE-2024-0001", 6.0)];
        let two = vec![record("CVE-2024-0001", 6.0), record("CVE-2024-0002", 3.0)];
        let (a1, _) = aggregator().aggregate(vec![(target("nginx:1.18.0"), one)]);
        let (a2, _) = aggregator().aggregate(vec![(target("nginx:1.18.0"), two)]);
        assert!(a2[0].risk_score > a1[0].risk_score);
    }

    #[test]
    fn test_overall_is_max_across_assets() {
        let (_, overall) = aggregator().aggregate(vec![
            (target("nginx:1.18.0"), vec![record("CVE-2024-0001", 9.8)]),
            (target("redis:6.2.0"), vec![record("CVE-2024-0002", 4.0)]),
            (target("clean-pkg:1.0.0"), vec![]),
        ]);
        assert_eq!(overall.value, 98.0);
        assert_eq!(overall.level, Severity::Critical);
    }

    #[test]
    fn test_recommendations_ordered_by_severity() {
        let (_, overall) = aggregator().aggregate(vec![(
            target("nginx:1.18.0"),
            vec![
                record("CVE-2024-0001", 5.0),
                record("CVE-2024-0002", 9.8),
                record("CVE-2024-0003", 7.5),
            ],
        )]);
        assert_eq!(overall.recommendations.len(), 3);
        assert!(overall.recommendations[0].contains("immediately"));
        assert!(overall.recommendations[1].contains("patch window"));
        assert!(overall.recommendations[2].contains("maintenance cycle"));
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let matches = vec![(
            target("nginx:1.18.0"),
            vec![record("CVE-2024-0001", 9.8), record("CVE-2024-0002", 5.0)],
        )];
        let first = aggregator().aggregate(matches.clone());
        let second = aggregator().aggregate(matches);
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_thresholds_change_bucketing() {
        let strict = RiskAggregator::new(RiskThresholds {
            low: 10.0,
            medium: 30.0,
            high: 60.0,
        });
        let (analyses, _) = strict.aggregate(vec![(
            target("nginx:1.18.0"),
            vec![record("CVE-2024-0001", 6.5)],
        )]);
        assert_eq!(analyses[0].risk_score, 65.0);
        assert_eq!(analyses[0].risk_level, Severity::Critical);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(RiskThresholds::default().validate().is_ok());
        assert!(RiskThresholds {
            low: 50.0,
            medium: 25.0,
            high: 75.0
        }
        .validate()
        .is_err());
        assert!(RiskThresholds {
            low: 0.0,
            medium: 25.0,
            high: 75.0
        }
        .validate()
        .is_err());
    }
}
