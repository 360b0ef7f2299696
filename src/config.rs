use crate::adapters::outbound::network::RetryPolicy;
use crate::risk_analysis::services::RiskThresholds;
use crate::shared::Result;
use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration, environment-style.
///
/// Every knob has a default suitable for local development; production
/// deployments override through the environment (or CLI flags, which take
/// precedence).
#[derive(Debug, Clone)]
pub struct Config {
    /// Control-surface bind address (`LISTEN_ADDR`).
    pub listen_addr: SocketAddr,
    /// Worker pool size (`WORKER_COUNT`).
    pub workers: usize,
    /// Delivery/attempt ceiling shared by the lookup client and the
    /// worker state machine (`MAX_RETRIES`).
    pub max_retries: u32,
    /// Backoff seed in milliseconds (`RETRY_DELAY`).
    pub retry_delay: Duration,
    /// Backoff ceiling in milliseconds (`MAX_RETRY_DELAY`).
    pub max_retry_delay: Duration,
    /// Extra cooldown after a remote rate-limit rejection, in
    /// milliseconds (`RATE_LIMIT_COOLDOWN`).
    pub rate_limit_cooldown: Duration,
    /// Per-attempt HTTP timeout in seconds (`REQUEST_TIMEOUT`).
    pub request_timeout: Duration,
    /// Record cap per job (`MAX_VULNERABILITIES_PER_REQUEST`).
    pub max_vulnerabilities_per_request: usize,
    /// Aggregate outbound call ceiling shared by all workers
    /// (`RATE_LIMIT_PER_SECOND`).
    pub rate_limit_per_second: u32,
    /// Lookup page size (`PAGE_SIZE`).
    pub page_size: usize,
    /// External vulnerability database base URL (`VULNDB_URL`).
    pub vulndb_url: String,
    /// Optional API key sent with each lookup (`VULNDB_API_KEY`).
    pub vulndb_api_key: Option<String>,
    /// Risk level bucketing (`RISK_THRESHOLD_LOW/_MEDIUM/_HIGH`).
    pub risk_thresholds: RiskThresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            workers: 4,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            max_retry_delay: Duration::from_millis(30_000),
            rate_limit_cooldown: Duration::from_millis(2000),
            request_timeout: Duration::from_secs(10),
            max_vulnerabilities_per_request: 50,
            rate_limit_per_second: 5,
            page_size: 20,
            vulndb_url: "https://services.nvd.nist.gov/rest/json/2.0".to_string(),
            vulndb_api_key: None,
            risk_thresholds: RiskThresholds::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// unset names. Seam for tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            listen_addr: parse_or(&lookup, "LISTEN_ADDR", defaults.listen_addr)?,
            workers: parse_or(&lookup, "WORKER_COUNT", defaults.workers)?,
            max_retries: parse_or(&lookup, "MAX_RETRIES", defaults.max_retries)?,
            retry_delay: millis_or(&lookup, "RETRY_DELAY", defaults.retry_delay)?,
            max_retry_delay: millis_or(&lookup, "MAX_RETRY_DELAY", defaults.max_retry_delay)?,
            rate_limit_cooldown: millis_or(
                &lookup,
                "RATE_LIMIT_COOLDOWN",
                defaults.rate_limit_cooldown,
            )?,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REQUEST_TIMEOUT",
                defaults.request_timeout.as_secs(),
            )?),
            max_vulnerabilities_per_request: parse_or(
                &lookup,
                "MAX_VULNERABILITIES_PER_REQUEST",
                defaults.max_vulnerabilities_per_request,
            )?,
            rate_limit_per_second: parse_or(
                &lookup,
                "RATE_LIMIT_PER_SECOND",
                defaults.rate_limit_per_second,
            )?,
            page_size: parse_or(&lookup, "PAGE_SIZE", defaults.page_size)?,
            vulndb_url: lookup("VULNDB_URL").unwrap_or(defaults.vulndb_url),
            vulndb_api_key: lookup("VULNDB_API_KEY").filter(|key| !key.is_empty()),
            risk_thresholds: RiskThresholds {
                low: parse_or(&lookup, "RISK_THRESHOLD_LOW", defaults.risk_thresholds.low)?,
                medium: parse_or(
                    &lookup,
                    "RISK_THRESHOLD_MEDIUM",
                    defaults.risk_thresholds.medium,
                )?,
                high: parse_or(
                    &lookup,
                    "RISK_THRESHOLD_HIGH",
                    defaults.risk_thresholds.high,
                )?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("WORKER_COUNT must be at least 1");
        }
        if self.max_retries == 0 {
            bail!("MAX_RETRIES must be at least 1");
        }
        if self.rate_limit_per_second == 0 {
            bail!("RATE_LIMIT_PER_SECOND must be at least 1");
        }
        if self.page_size == 0 {
            bail!("PAGE_SIZE must be at least 1");
        }
        if self.max_vulnerabilities_per_request == 0 {
            bail!("MAX_VULNERABILITIES_PER_REQUEST must be at least 1");
        }
        if self.vulndb_url.trim().is_empty() {
            bail!("VULNDB_URL must not be empty");
        }
        self.risk_thresholds.validate()?;
        Ok(())
    }

    /// Lookup-client retry policy derived from the shared knobs.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: self.retry_delay,
            max_delay: self.max_retry_delay,
            rate_limit_cooldown: self.rate_limit_cooldown,
        }
    }
}

fn parse_or<T>(lookup: impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", name, raw)),
        None => Ok(default),
    }
}

fn millis_or(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration> {
    Ok(Duration::from_millis(parse_or(
        lookup,
        name,
        default.as_millis() as u64,
    )?))
}
