use crate::shared::Result;
use serde::{Deserialize, Serialize};

/// Maximum length for target identifiers (security limit)
const MAX_TARGET_LENGTH: usize = 255;

/// NewType wrapper for an asset identifier with validation.
///
/// A target is either a `name:version` pair (`nginx:1.18.0`) or a
/// CPE-style platform identifier (`cpe:2.3:a:nginx:nginx:1.18.0`).
/// Segments are separated by `:` and compared case-insensitively
/// by the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target(String);

impl Target {
    pub fn new(raw: String) -> Result<Self> {
        if raw.trim().is_empty() {
            anyhow::bail!("Target identifier cannot be empty");
        }

        // Security: Length limit to prevent DoS
        if raw.len() > MAX_TARGET_LENGTH {
            anyhow::bail!(
                "Target identifier is too long ({} bytes). Maximum allowed: {} bytes",
                raw.len(),
                MAX_TARGET_LENGTH
            );
        }

        // Security: Validate characters to prevent injection into outbound queries
        if !raw.chars().all(|c| {
            c.is_alphanumeric()
                || c == ':'
                || c == '.'
                || c == '-'
                || c == '_'
                || c == '+'
                || c == '*'
        }) {
            anyhow::bail!(
                "Target identifier contains invalid characters. Only alphanumeric, colons, dots, hyphens, underscores, plus signs, and asterisks are allowed."
            );
        }

        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier segments with any `cpe:<version>:<part>` prefix stripped,
    /// lowercased for comparison.
    pub fn comparable_segments(&self) -> Vec<String> {
        comparable_segments(&self.0)
    }

    /// The product segment, used as the lookup keyword against the
    /// vulnerability database. Two-segment identifiers are `name:version`;
    /// three or more segments are `vendor:product:version...`.
    pub fn product(&self) -> String {
        let segments = self.comparable_segments();
        match segments.len() {
            0 => String::new(),
            1 | 2 => segments[0].clone(),
            _ => segments[1].clone(),
        }
    }
}

/// Splits an identifier on `:`, lowercases segments, and strips the
/// `cpe:2.3:a` style prefix so that CPE identifiers and plain
/// `name:version` pairs compare on the same axes.
pub(crate) fn comparable_segments(raw: &str) -> Vec<String> {
    let segments: Vec<String> = raw.split(':').map(|s| s.to_lowercase()).collect();
    if segments.first().map(String::as_str) == Some("cpe") && segments.len() > 3 {
        segments[3..].to_vec()
    } else {
        segments
    }
}

impl TryFrom<String> for Target {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        Target::new(value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.0
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_new_valid() {
        let target = Target::new("nginx:1.18.0".to_string()).unwrap();
        assert_eq!(target.as_str(), "nginx:1.18.0");
    }

    #[test]
    fn test_target_new_empty() {
        assert!(Target::new("".to_string()).is_err());
        assert!(Target::new("   ".to_string()).is_err());
    }

    #[test]
    fn test_target_new_too_long() {
        let result = Target::new("a".repeat(MAX_TARGET_LENGTH + 1));
        assert!(result.is_err());
    }

    #[test]
    fn test_target_new_invalid_characters() {
        assert!(Target::new("nginx;drop table".to_string()).is_err());
        assert!(Target::new("nginx 1.18".to_string()).is_err());
    }

    #[test]
    fn test_comparable_segments_plain() {
        let target = Target::new("Nginx:1.18.0".to_string()).unwrap();
        assert_eq!(target.comparable_segments(), vec!["nginx", "1.18.0"]);
    }

    #[test]
    fn test_comparable_segments_cpe_prefix_stripped() {
        let target = Target::new("cpe:2.3:a:nginx:nginx:1.18.0".to_string()).unwrap();
        assert_eq!(
            target.comparable_segments(),
            vec!["nginx", "nginx", "1.18.0"]
        );
    }

    #[test]
    fn test_product_segment() {
        let plain = Target::new("openssl:1.1.1k".to_string()).unwrap();
        assert_eq!(plain.product(), "openssl");

        let cpe = Target::new("cpe:2.3:a:f5:nginx:1.18.0".to_string()).unwrap();
        assert_eq!(cpe.product(), "nginx");
    }

    #[test]
    fn test_target_serde_round_trip() {
        let target = Target::new("nginx:1.18.0".to_string()).unwrap();
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, "\"nginx:1.18.0\"");
        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn test_target_deserialize_rejects_invalid() {
        let result: std::result::Result<Target, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }
}
