use std::path::PathBuf;

use clap::Parser;
use rxlb::{Config, LoadBalancer};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// HTTP load balancer with path based routing and health checking.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file, YAML if the extension is `.yaml` or `.yml`, TOML
    /// otherwise.
    #[arg(long, short = 'c')]
    config_path: PathBuf,

    /// Overrides the port of the `listen` address in the configuration file.
    #[arg(long, short = 'p')]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_file(&args.config_path)?;

    if let Some(port) = args.port {
        config.listen.set_port(port);
    }

    info!(config = %args.config_path.display(), version = rxlb::VERSION, "Starting load balancer");

    LoadBalancer::init(config)?
        .shutdown_on(tokio::signal::ctrl_c())
        .run()
        .await?;

    Ok(())
}
