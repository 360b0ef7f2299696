use crate::risk_analysis::domain::target::comparable_segments;
use crate::risk_analysis::domain::{Target, VulnerabilityRecord};
use std::collections::HashSet;

/// Matches vulnerability records against submitted asset identifiers.
///
/// Matching is pure and deterministic: given identical targets and records
/// the output is always identical. Comparison is case-insensitive per
/// `:`-separated segment; an affected identifier generalizes over a target
/// when it omits the version or uses `*` for it.
#[derive(Debug, Clone, Default)]
pub struct Matcher;

impl Matcher {
    pub fn new() -> Self {
        Self
    }

    /// Produces one entry per distinct target, in submission order.
    ///
    /// Unmatched targets yield an empty record list, never an error.
    /// Matched records are ordered by descending score, tie-broken by id.
    pub fn match_targets(
        &self,
        targets: &[Target],
        records: &[VulnerabilityRecord],
    ) -> Vec<(Target, Vec<VulnerabilityRecord>)> {
        let mut seen: HashSet<&Target> = HashSet::new();
        let mut matches = Vec::with_capacity(targets.len());

        for target in targets {
            if !seen.insert(target) {
                continue;
            }

            let mut matched: Vec<VulnerabilityRecord> = records
                .iter()
                .filter(|record| {
                    record
                        .affected_identifiers
                        .iter()
                        .any(|affected| identifier_matches(affected, target))
                })
                .cloned()
                .collect();

            matched.sort_by(|a, b| {
                b.score
                    .value()
                    .total_cmp(&a.score.value())
                    .then_with(|| a.id.cmp(&b.id))
            });

            matches.push((target.clone(), matched));
        }

        matches
    }
}

/// Whether `affected` applies to `target`.
///
/// Both identifiers are reduced to lowercased comparable segments. Each
/// affected segment must equal the corresponding target segment or be `*`.
/// An affected identifier shorter than the target leaves the remaining
/// target segments unconstrained (same product, any version); a longer one
/// only matches if every extra segment is `*`.
fn identifier_matches(affected: &str, target: &Target) -> bool {
    let affected_segments = comparable_segments(affected);
    let target_segments = target.comparable_segments();

    if affected_segments.is_empty() || target_segments.is_empty() {
        return false;
    }

    for (i, affected_segment) in affected_segments.iter().enumerate() {
        if affected_segment == "*" {
            continue;
        }
        match target_segments.get(i) {
            Some(target_segment) if target_segment == affected_segment => {}
            _ => return false,
        }
    }

    true
}
