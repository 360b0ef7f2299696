use crate::ports::outbound::{VulnerabilityPage, VulnerabilitySource};
use crate::risk_analysis::domain::{CvssScore, Severity, VulnerabilityRecord};
use crate::shared::{PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Client for the NVD-style vulnerability database API.
///
/// Issues single-page keyword queries; rate limiting, retry, and
/// pagination policy belong to the decorating `VulnerabilityClient`.
///
/// # Security
/// - Bounds each attempt with the configured request timeout
/// - Encodes query terms before they reach the URL
pub struct NvdApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl NvdApiClient {
    /// Creates a new client with a per-request timeout.
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let user_agent = format!("vulnpipe/{}", env!("CARGO_PKG_VERSION"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        })
    }

    fn page_url(&self, query: &str, offset: usize, page_size: usize) -> String {
        format!(
            "{}/cves?keyword={}&offset={}&limit={}",
            self.base_url,
            urlencoding::encode(query),
            offset,
            page_size
        )
    }
}

#[async_trait]
impl VulnerabilitySource for NvdApiClient {
    async fn fetch_page(
        &self,
        query: &str,
        offset: usize,
        page_size: usize,
    ) -> std::result::Result<VulnerabilityPage, PipelineError> {
        let url = self.page_url(query, offset, page_size);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("apiKey", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_request_error(e, &url, self.timeout))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(PipelineError::UpstreamRateLimited {
                status: status.as_u16(),
            });
        }
        if status.is_server_error() {
            return Err(PipelineError::UpstreamServer {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let details = response.text().await.unwrap_or_default();
            return Err(PipelineError::BadRequest {
                status: status.as_u16(),
                details: truncate(&details, 200),
            });
        }

        let body: QueryResponse =
            response
                .json()
                .await
                .map_err(|e| PipelineError::MalformedResponse {
                    details: e.to_string(),
                })?;

        Ok(VulnerabilityPage {
            total: body.total_results,
            records: body
                .vulnerabilities
                .into_iter()
                .filter_map(convert_record)
                .collect(),
        })
    }
}

fn classify_request_error(error: reqwest::Error, url: &str, timeout: Duration) -> PipelineError {
    if error.is_timeout() {
        PipelineError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        PipelineError::Connection {
            details: error.to_string(),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Converts a wire entry to the domain record. Entries without an id or
/// with an out-of-range score are skipped rather than failing the page.
fn convert_record(entry: VulnerabilityEntry) -> Option<VulnerabilityRecord> {
    if entry.id.is_empty() {
        return None;
    }
    let score = CvssScore::new(entry.score).ok()?;
    let severity = entry
        .severity
        .as_deref()
        .and_then(parse_severity)
        .unwrap_or_else(|| Severity::from_cvss_score(score.value()));

    Some(VulnerabilityRecord {
        id: entry.id,
        description: entry.description.unwrap_or_default(),
        severity,
        score,
        affected_identifiers: entry.affected,
        published_at: entry.published.unwrap_or_else(Utc::now),
    })
}

/// Maps database severity strings to the domain ordinal. `MODERATE` is an
/// alias some feeds use for MEDIUM.
fn parse_severity(raw: &str) -> Option<Severity> {
    match raw.to_uppercase().as_str() {
        "CRITICAL" => Some(Severity::Critical),
        "HIGH" => Some(Severity::High),
        "MODERATE" | "MEDIUM" => Some(Severity::Medium),
        "LOW" => Some(Severity::Low),
        _ => None,
    }
}

// Wire structures for the query API

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    total_results: usize,
    #[serde(default)]
    vulnerabilities: Vec<VulnerabilityEntry>,
}

#[derive(Debug, Deserialize)]
struct VulnerabilityEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    affected: Vec<String>,
    #[serde(default)]
    published: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = NvdApiClient::new(
            "https://vulndb.example/api/".to_string(),
            None,
            Duration::from_secs(10),
        );
        assert!(client.is_ok());
    }

    #[test]
    fn test_page_url_encodes_query_and_strips_slash() {
        let client = NvdApiClient::new(
            "https://vulndb.example/api/".to_string(),
            None,
            Duration::from_secs(10),
        )
        .unwrap();
        let url = client.page_url("nginx http/2", 40, 20);
        assert_eq!(
            url,
            "https://vulndb.example/api/cves?keyword=nginx%20http%2F2&offset=40&limit=20"
        );
    }

    #[test]
    fn test_query_response_deserialize() {
        let json = r#"{
            "total_results": 2,
            "vulnerabilities": [
                {
                    "id": "CVE-2024-1234",
                    "description": "Buffer overflow in HTTP parser",
                    "severity": "CRITICAL",
                    "score": 9.8,
                    "affected": ["nginx:*"],
                    "published": "2024-03-01T00:00:00Z"
                },
                {
                    "id": "CVE-2024-5678",
                    "score": 5.3,
                    "affected": ["nginx:1.18.0"]
                }
            ]
        }"#;
        let parsed: QueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.total_results, 2);
        assert_eq!(parsed.vulnerabilities.len(), 2);
        assert_eq!(parsed.vulnerabilities[1].severity, None);
    }

    #[test]
    fn test_query_response_deserialize_empty() {
        let parsed: QueryResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.total_results, 0);
        assert!(parsed.vulnerabilities.is_empty());
    }

    #[test]
    fn test_convert_record_severity_fallback_from_score() {
        let entry = VulnerabilityEntry {
            id: "CVE-2024-5678".to_string(),
            description: None,
            severity: None,
            score: 5.3,
            affected: vec!["nginx:1.18.0".to_string()],
            published: None,
        };
        let record = convert_record(entry).unwrap();
        assert_eq!(record.severity, Severity::Medium);
        assert_eq!(record.description, "");
    }

    #[test]
    fn test_convert_record_skips_missing_id_and_bad_score() {
        let no_id = VulnerabilityEntry {
            id: String::new(),
            description: None,
            severity: None,
            score: 5.0,
            affected: vec![],
            published: None,
        };
        assert!(convert_record(no_id).is_none());

        let bad_score = VulnerabilityEntry {
            id: "CVE-2024-0001".to_string(),
            description: None,
            severity: None,
            score: 42.0,
            affected: vec![],
            published: None,
        };
        assert!(convert_record(bad_score).is_none());
    }

    #[test]
    fn test_parse_severity_aliases() {
        assert_eq!(parse_severity("critical"), Some(Severity::Critical));
        assert_eq!(parse_severity("MODERATE"), Some(Severity::Medium));
        assert_eq!(parse_severity("unknown"), None);
    }
}
