use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use dojo::app::command::Command;
use dojo::{App, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dojo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Snapshot file to use instead of the configured store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }

    // Logs go to stderr; stdout carries the JSON reply
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let app = App::new(&config)?;
    let reply = app.execute(cli.command).await;
    println!("{}", serde_json::to_string_pretty(&reply)?);

    Ok(())
}
