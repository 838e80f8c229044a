use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "jiopad")]
#[command(about = "JIO block DAG node daemon", long_about = None)]
pub struct Args {
    /// Path to configuration file (optional, uses defaults if not provided)
    #[arg(short, long)]
    pub config_path: Option<PathBuf>,

    /// Data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Network (mainnet, testnet, devnet, simnet)
    #[arg(short, long)]
    pub network: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Keep all state in memory
    #[arg(long)]
    pub in_memory: bool,

    /// Import hex-encoded blocks, one per line, before serving
    #[arg(long)]
    pub import: Option<PathBuf>,

    /// Mine this many blocks on top of the virtual as a self-check
    #[arg(long)]
    pub self_check: Option<u64>,

    /// Exit after import and self-check instead of running until interrupted
    #[arg(long)]
    pub oneshot: bool,
}

pub fn parse_args() -> Args {
    Args::parse()
}
