use std::path::PathBuf;

use clap::Parser;

/// Nexus gateway
#[derive(Debug, Parser)]
#[command(name = "nexus", about = "Failover gateway for OpenAI-compatible chat completion upstreams")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "nexus.toml", env = "NEXUS_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "NEXUS_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,

    /// `tracing-subscriber` env-filter directive
    #[arg(long, default_value = "info", env = "NEXUS_LOG")]
    pub log_filter: String,
}
