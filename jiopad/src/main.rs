use jiopad::{cli, Config, Node, NodeError};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = cli::parse_args();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("jiopad: {e}");
            process::exit(2);
        }
    };

    init_logging(&config.logging.level);
    info!(version = env!("CARGO_PKG_VERSION"), network = %config.network.network, "starting jiopad");

    if let Err(e) = run(config, &args).await {
        error!(%e, fatal = e.is_fatal(), "jiopad stopped on error");
        process::exit(1);
    }
    info!("jiopad stopped gracefully");
}

fn load_config(args: &cli::Args) -> Result<Config, NodeError> {
    let mut config = match &args.config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_cli_overrides(args)?;
    Ok(config)
}

async fn run(config: Config, args: &cli::Args) -> Result<(), NodeError> {
    let node = Node::open(config)?;

    if let Some(path) = &args.import {
        node.import_blocks(path)?;
    }
    if let Some(count) = args.self_check {
        node.self_check(count)?;
    }
    if args.oneshot {
        return Ok(());
    }
    node.run().await
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt().with_env_filter(filter).with_target(true).with_thread_ids(true).init();
}
