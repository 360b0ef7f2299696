use crate::adapters::outbound::network::RateLimiter;
use crate::ports::outbound::{VulnerabilityPage, VulnerabilitySource};
use crate::risk_analysis::domain::VulnerabilityRecord;
use crate::shared::{ErrorCategory, PipelineError};
use futures::Stream;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff policy for transient lookup failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first.
    pub max_retries: u32,
    /// Backoff seed; attempt n waits `initial_delay * 2^(n-1)`.
    pub initial_delay: Duration,
    /// Ceiling on any single backoff delay.
    pub max_delay: Duration,
    /// Extra wait added when the external database rejected for rate
    /// limiting, on top of the backoff delay.
    pub rate_limit_cooldown: Duration,
}

impl RetryPolicy {
    fn delay_for(&self, completed_attempts: u32) -> Duration {
        let exp = completed_attempts.saturating_sub(1).min(16);
        let delay = self.initial_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

/// Rate-limited, retrying lookup client over any `VulnerabilitySource`.
///
/// Decorates the raw source with the policy the pipeline requires: every
/// page request first acquires a shared rate-limiter token, transient
/// failures are retried with exponential backoff (plus a cooldown when the
/// remote service itself rate-limited us), and permanent failures
/// propagate immediately. `lookup` exposes the paginated results as a
/// lazy, finite stream so callers can stop consuming early without
/// issuing further requests.
pub struct VulnerabilityClient {
    source: Arc<dyn VulnerabilitySource>,
    limiter: RateLimiter,
    retry: RetryPolicy,
    page_size: usize,
    /// Cap on records yielded per lookup; pagination stops once reached.
    max_records: usize,
}

impl VulnerabilityClient {
    pub fn new(
        source: Arc<dyn VulnerabilitySource>,
        limiter: RateLimiter,
        retry: RetryPolicy,
        page_size: usize,
        max_records: usize,
    ) -> Self {
        Self {
            source,
            limiter,
            retry,
            page_size,
            max_records,
        }
    }

    /// Lazily yields records matching `query`, at most `max_records`.
    pub fn lookup<'a>(
        &'a self,
        query: &'a str,
    ) -> impl Stream<Item = Result<VulnerabilityRecord, PipelineError>> + 'a {
        let state = LookupState {
            offset: 0,
            yielded: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        };

        futures::stream::try_unfold(state, move |mut state| async move {
            loop {
                if state.yielded >= self.max_records {
                    return Ok(None);
                }
                if let Some(record) = state.buffer.pop_front() {
                    state.yielded += 1;
                    return Ok(Some((record, state)));
                }
                if state.exhausted {
                    return Ok(None);
                }

                let page = self.fetch_page_with_retry(query, state.offset).await?;
                if page.records.is_empty() {
                    state.exhausted = true;
                    return Ok(None);
                }
                state.offset += page.records.len();
                if state.offset >= page.total {
                    state.exhausted = true;
                }
                state.buffer.extend(page.records);
            }
        })
    }

    async fn fetch_page_with_retry(
        &self,
        query: &str,
        offset: usize,
    ) -> Result<VulnerabilityPage, PipelineError> {
        let mut attempts = 0u32;
        loop {
            self.limiter.acquire().await;
            match self.source.fetch_page(query, offset, self.page_size).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() => {
                    attempts += 1;
                    if attempts >= self.retry.max_retries {
                        return Err(PipelineError::RetriesExhausted {
                            attempts,
                            source: Box::new(e),
                        });
                    }
                    let mut delay = self.retry.delay_for(attempts);
                    if e.category() == ErrorCategory::ExternalRateLimited {
                        delay += self.retry.rate_limit_cooldown;
                    }
                    warn!(
                        query,
                        offset,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient lookup failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

struct LookupState {
    offset: usize,
    yielded: usize,
    buffer: VecDeque<VulnerabilityRecord>,
    exhausted: bool,
}
