use std::path::PathBuf;

use clap::Parser;
use swerve_zenoh_runtime::config::DrivetrainConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Swerve drive runtime: consumes drive commands and publishes pose telemetry over Zenoh
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON drivetrain config; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading drivetrain config from {}", path.display());
            DrivetrainConfig::load(path)
        }
        None => Ok(DrivetrainConfig::default()),
    };

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = swerve_zenoh_runtime::runtime::run(config).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
