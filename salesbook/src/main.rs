// Salesbook command-line driver
// Opens a data directory and runs one command against it

use anyhow::Context;
use clap::Parser;
use salesbook::app::AppState;
use salesbook::cli::{execute, CliArgs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salesbook=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();
    tracing::info!("Starting salesbook");

    let state = AppState::open(&args.data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", args.data_dir.display()))?;

    let output = execute(&state, args.command).await?;
    print!("{}", output);

    Ok(())
}
