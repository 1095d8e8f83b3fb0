use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, PartialEq)]
#[command(name = "gitpulse")]
#[command(about = "gitpulse - average time between activity events of GitHub repositories, served over HTTP")]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to serve the HTTP API on (overrides config)
    #[arg(long)]
    pub bind: Option<String>,

    /// Snapshot file loaded at startup and written at shutdown (overrides config)
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}
