use clap::Parser;
use dotenvy::dotenv;
use nfe_manager::{cli::Cli, config::settings::load_settings, errors::Result};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only tables and notices
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    dotenv().ok();
    info!("Attempted to load .env file.");

    let settings = load_settings(&cli.config)
        .inspect_err(|e| error!("Critical error loading settings: {}", e))?;

    nfe_manager::cli::run(cli, &settings).await
}
