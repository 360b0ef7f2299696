use crate::risk_analysis::domain::VulnerabilityRecord;
use crate::shared::PipelineError;
use async_trait::async_trait;

/// One page of a paginated lookup against the external database.
#[derive(Debug, Clone, PartialEq)]
pub struct VulnerabilityPage {
    pub records: Vec<VulnerabilityRecord>,
    /// Total records the database holds for the query, across all pages.
    pub total: usize,
}

/// VulnerabilitySource port for raw paginated queries against the
/// external vulnerability database.
///
/// Implementations issue exactly one request per `fetch_page` call; rate
/// limiting, retry, and pagination policy live in the decorating
/// `VulnerabilityClient`, keeping this port trivial to double in tests.
///
/// # Async Support
/// Implementations must be `Send + Sync` to support concurrent workers.
#[async_trait]
pub trait VulnerabilitySource: Send + Sync {
    /// Fetches one page of records matching `query`.
    ///
    /// # Errors
    /// Returns a `PipelineError` already classified into the retry
    /// taxonomy: timeouts and 5xx as transient, 429 as rate-limited,
    /// other 4xx and undecodable bodies as permanent.
    async fn fetch_page(
        &self,
        query: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<VulnerabilityPage, PipelineError>;
}
