pub mod nvd_client;
pub mod rate_limit;
pub mod vulnerability_client;

pub use nvd_client::NvdApiClient;
pub use rate_limit::RateLimiter;
pub use vulnerability_client::{RetryPolicy, VulnerabilityClient};
