use anyhow::Result;
use clap::Parser;
use gitpulse::app::GitPulseApp;
use gitpulse::cli::CliArgs;
use gitpulse::config::Config;
use tracing::{error, info};

fn main() -> Result<()> {
    // Initialize tracing with env filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting gitpulse");

    let cli_args = CliArgs::parse();
    let config = Config::from_cli_and_file(cli_args)?;

    let app = GitPulseApp::new(config)?;
    if let Err(e) = app.run() {
        error!("Application error: {:#}", e);
        return Err(e);
    }

    info!("gitpulse shut down cleanly");
    Ok(())
}
