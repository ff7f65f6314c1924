//! CLI + environment configuration.
//!
//! Built on `clap`'s derive API: a dozen transport and tier knobs beyond
//! the basics, the kind of surface worth a proper derive parser rather
//! than hand-rolled argument parsing.
//! Precedence, outer to inner: CLI flag, `KATRA_*` environment variable,
//! `config/katra.env` (loaded via `dotenvy`), then a hardcoded default.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use katra_core::config::CoreConfig;

use crate::error::{ServerError, ServerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportMode {
    Stdio,
    Unix,
    Tcp,
    All,
}

/// Raw CLI surface (`katra --help` shows exactly this).
#[derive(Debug, Parser)]
#[command(name = "katra", version, about = "Katra: persistent multi-tenant memory substrate for long-running CIs")]
pub struct Cli {
    /// Root directory for every tier (hot/tier2/index/audit). Required,
    /// either here, `--data-dir`, or `KATRA_ROOT`.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Alias for `--root`.
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "stdio")]
    pub transport: TransportMode,

    #[arg(long, env = "KATRA_MCP_TCP_BIND", default_value = "127.0.0.1")]
    pub tcp_bind: String,

    #[arg(long, env = "KATRA_MCP_TCP_PORT", default_value_t = 3141)]
    pub tcp_port: u16,

    #[arg(long, env = "KATRA_MCP_MAX_CLIENTS", default_value_t = 32)]
    pub max_clients: usize,

    #[arg(long, default_value = "katra.sock")]
    pub unix_socket: PathBuf,

    #[arg(long, env = "KATRA_CONSOLIDATION_INTERVAL_HOURS", default_value_t = 6)]
    pub consolidation_interval_hours: u64,
}

/// Resolved configuration handed to `main`.
pub struct Config {
    pub core: CoreConfig,
    pub transport: TransportMode,
    pub tcp_bind: String,
    pub tcp_port: u16,
    pub max_clients: usize,
    pub unix_socket: PathBuf,
    pub consolidation_interval_hours: u64,
}

impl Config {
    /// Loads `config/katra.env` (if present) into the process environment
    /// before parsing, so `KATRA_*` vars set there are visible to clap's
    /// `env = "..."` attributes. Missing file is not an error.
    pub fn load() -> ServerResult<Self> {
        let _ = dotenvy::from_filename("config/katra.env");
        let cli = Cli::parse();

        let root = cli
            .root
            .clone()
            .or(cli.data_dir.clone())
            .or_else(|| std::env::var("KATRA_ROOT").ok().map(PathBuf::from))
            .ok_or(ServerError::MissingRoot)?;

        let mut core = CoreConfig::new(root);
        if let Ok(days) = env_parse::<i64>("KATRA_TIER1_RETENTION_DAYS") {
            core.max_age_days = days;
        }
        if let Ok(days) = env_parse::<i64>("KATRA_TIER2_RETENTION_DAYS") {
            core.retention_days = days;
        }
        if let Ok(mb) = env_parse::<u64>("KATRA_TIER1_MAX_FILE_MB") {
            core.hot_tier_max_file_bytes = mb * 1024 * 1024;
        }
        if let Ok(mb) = env_parse::<u64>("KATRA_TIER2_MAX_FILE_MB") {
            core.digest_max_file_bytes = mb * 1024 * 1024;
        }

        Ok(Self {
            core,
            transport: cli.transport,
            tcp_bind: cli.tcp_bind,
            tcp_port: cli.tcp_port,
            max_clients: cli.max_clients,
            unix_socket: cli.unix_socket,
            consolidation_interval_hours: cli.consolidation_interval_hours,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<T, ()> {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).ok_or(())
}
