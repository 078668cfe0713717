use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bandcover::config::Config;
use bandcover::pipeline;

#[derive(Parser)]
#[command(name = "bandcover", version, about = "Fetch album covers for a JSON list of albums")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a cover for every album in the JSON file
    Run {
        /// JSON array of {artist, album, year?, coverSrc?} entries
        path: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables if .env exists
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bandcover=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Command::Run { path } => {
            tracing::info!("Writing covers under {}", config.output_dir.display());

            let summary = pipeline::run(&path, &config).await?;

            tracing::info!(
                "Done: {} albums, {} covers, {} artist images, {} defaults, {} errors",
                summary.total,
                summary.found,
                summary.artist_found,
                summary.defaulted,
                summary.errors
            );
        }
    }

    Ok(())
}
