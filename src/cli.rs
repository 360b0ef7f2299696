use crate::config::Config;
use clap::Parser;
use std::net::SocketAddr;

/// Queue-driven vulnerability analysis pipeline
#[derive(Parser, Debug)]
#[command(name = "vulnpipe")]
#[command(version)]
#[command(
    about = "Queue-driven vulnerability analysis pipeline",
    long_about = None
)]
pub struct Args {
    /// Control-surface listen address (overrides LISTEN_ADDR)
    #[arg(short, long)]
    pub listen: Option<SocketAddr>,

    /// Worker pool size (overrides WORKER_COUNT)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Vulnerability database base URL (overrides VULNDB_URL)
    #[arg(long, value_name = "URL")]
    pub vulndb_url: Option<String>,

    /// Tracing filter, e.g. "info" or "vulnpipe=debug"
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Applies CLI overrides on top of environment configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(url) = &self.vulndb_url {
            config.vulndb_url = url.clone();
        }
    }
}
