use crate::shared::Result;
use governor::{Quota, RateLimiter as GovernorLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovernorLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Token-bucket rate limiter shared by all workers in the process.
///
/// Bounds the aggregate outbound call rate to the external vulnerability
/// database. `acquire` suspends the calling worker until a token is free;
/// waiters are served in arrival order, so no caller starves under
/// contention. Cloning shares the same token pool.
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Creates a limiter allowing `rate` requests per second.
    pub fn per_second(rate: u32) -> Result<Self> {
        let rate = NonZeroU32::new(rate)
            .ok_or_else(|| anyhow::anyhow!("Rate limit ceiling must be greater than 0"))?;
        let limiter = GovernorLimiter::direct(Quota::per_second(rate));
        Ok(Self {
            limiter: Arc::new(limiter),
        })
    }

    /// Waits until the rate limit allows another outbound call.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// Acquires a token without waiting, if one is available.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
        }
    }
}
