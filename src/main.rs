//! ClipMark command-line cutter
//!
//! ```bash
//! clipmark cut -i video.mp4 -r 00:01:00-00:01:10 -r 90..95.5 --method precise
//! clipmark cut -i video.mp4 -r 12-14 --method loop --loop-count 3
//! clipmark playlist -s ~/videos --filter "holiday" --shuffle
//! clipmark config
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use clipmark::app::DefaultAppContainer;
use clipmark::cli::{commands, Cli, Commands};
use clipmark::config_initialization::initialize_configuration;
use clipmark::utils::logging::LoggingSystem;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let adapter = initialize_configuration(&cli)?;
    let logging = LoggingSystem::new(adapter.config().logging_config()?);
    logging.initialize();
    logging.log_system_info();
    if let Some(source) = adapter.source() {
        info!("Using configuration file {}", source.display());
    }
    let config = adapter.into_config();

    let success = match cli.command {
        Commands::Cut(args) => {
            info!("Executing cut command");
            commands::cut(config, args).await?
        }
        Commands::Playlist(args) => {
            info!("Executing playlist command");
            let container = DefaultAppContainer::new(config, Vec::new())?;
            commands::playlist(&container, args)?;
            true
        }
        Commands::Config => {
            commands::config(&config)?;
            true
        }
    };

    if success {
        Ok(ExitCode::SUCCESS)
    } else {
        error!("Some sequences could not be exported");
        Ok(ExitCode::FAILURE)
    }
}
