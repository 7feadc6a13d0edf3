//! vidfetch CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vidfetch::cli::commands::{self, BatchArgs};
use vidfetch::cli::{Cli, Commands};
use vidfetch::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("vidfetch={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Execute command
    match &cli.command {
        Commands::Download { url, fetch, skip_existing } => {
            commands::run_download(url.as_deref(), fetch, *skip_existing, &settings).await?;
        }

        Commands::Batch {
            urls,
            file,
            limit,
            jobs,
            no_skip_existing,
            save,
            fetch,
        } => {
            let args = BatchArgs {
                urls: urls.clone(),
                file: file.clone(),
                limit: *limit,
                jobs: *jobs,
                no_skip_existing: *no_skip_existing,
                save: *save,
            };
            commands::run_batch(&args, fetch, &settings).await?;
        }

        Commands::List { output_dir } => {
            commands::run_list(output_dir.as_deref(), &settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(cli.config.as_deref(), &settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, cli.config.as_deref(), &settings)?;
        }
    }

    Ok(())
}
