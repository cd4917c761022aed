//! Command implementations

use std::sync::Arc;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::toml_config::AppConfig;
use crate::adapters::{FolderCache, PlaylistFileReader};
use crate::app::{AppContainer, DefaultAppContainer};
use crate::cli::args::{CutArgs, PlaylistArgs};
use crate::domain::model::{MediaLocator, OperationState, SequenceSnapshot};
use crate::engine::observer::{ConsoleObserver, EventObserver, JsonObserver};
use crate::engine::CutScope;
use crate::playlist::Playlist;
use crate::registry::MarkOutcome;
use crate::utils::time::TimeParser;

/// Result of a cut run, printed as the final summary
#[derive(Debug, Serialize)]
struct CutSummary {
    input: String,
    method: String,
    succeeded: usize,
    failed: usize,
    sequences: Vec<SequenceSnapshot>,
}

/// Execute the cut command. Returns whether every sequence was exported.
pub async fn cut(mut config: AppConfig, args: CutArgs) -> Result<bool> {
    info!("Starting cut operation");
    info!("Input: {}", args.input.display());
    info!("Method: {}", args.method);

    if !args.input.is_file() {
        return Err(anyhow::anyhow!(
            "Input file does not exist: {}",
            args.input.display()
        ));
    }

    let parser = TimeParser::new();
    let ranges = args
        .ranges
        .iter()
        .map(|range| {
            parser
                .parse_range(range)
                .with_context(|| format!("Invalid range '{}'", range))
        })
        .collect::<Result<Vec<_>>>()?;

    if let Some(loop_count) = args.loop_count {
        config.encoder.loop_count = loop_count;
    }
    if let Some(dir) = &args.output_dir {
        config.output.directory = Some(dir.clone());
    }
    if let Some(timeout) = args.timeout {
        config.encoder.stage_timeout_secs = Some(timeout);
    }

    let observer: Arc<dyn EventObserver> = if args.json {
        Arc::new(JsonObserver::new(args.progress))
    } else {
        Arc::new(ConsoleObserver::new(args.progress))
    };
    let container = DefaultAppContainer::new(config, vec![observer])
        .context("Invalid configuration")?;

    let mut session = container.cut_session();
    session.load(vec![MediaLocator::from_path(&args.input)]);

    for (start, end) in ranges {
        session.mark(start);
        if let MarkOutcome::Discarded = session.mark(end) {
            warn!("Range {} - {} is too short, skipped", start, end);
        }
    }

    let chains = session
        .cut(args.method, CutScope::AllReady)
        .context("Failed to start cut")?;
    info!("Started {} cut chain(s)", chains.len());
    session.run_until_idle().await;

    let sequences = session.snapshot();
    let summary = CutSummary {
        input: args.input.display().to_string(),
        method: args.method.to_string(),
        succeeded: count_state(&sequences, OperationState::Succeeded),
        failed: count_state(&sequences, OperationState::Failed),
        sequences,
    };
    let all_succeeded =
        !summary.sequences.is_empty() && summary.succeeded == summary.sequences.len();

    if args.json {
        let json = serde_json::to_string_pretty(&summary)
            .context("Failed to serialize cut summary to JSON")?;
        println!("{}", json);
    } else {
        display_summary(&summary);
    }

    info!("Cut operation completed");
    Ok(all_succeeded)
}

fn count_state(sequences: &[SequenceSnapshot], state: OperationState) -> usize {
    sequences.iter().filter(|s| s.state == state).count()
}

fn display_summary(summary: &CutSummary) {
    println!("Cut Summary");
    println!("===========");
    println!("Input:  {}", summary.input);
    println!("Method: {}", summary.method);
    println!();
    for snapshot in &summary.sequences {
        let output = snapshot
            .output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {:<10} {}",
            snapshot.sequence(),
            snapshot.state.to_string(),
            output
        );
    }
    println!();
    println!(
        "{} succeeded, {} failed, {} total",
        summary.succeeded,
        summary.failed,
        summary.sequences.len()
    );
}

#[derive(Debug, Serialize)]
struct PlaylistView {
    total: usize,
    visible: usize,
    items: Vec<String>,
}

/// Execute the playlist command
pub fn playlist(container: &dyn AppContainer, args: PlaylistArgs) -> Result<()> {
    info!("Reading playlist from {}", args.source.display());

    let items = match &args.cache {
        Some(cache_path) => {
            let mut reader = PlaylistFileReader::with_cache(FolderCache::open(cache_path));
            let items = reader.read_cached(&args.source)?;
            if let Err(e) = reader.save_cache() {
                warn!("Could not save folder cache {}: {}", cache_path.display(), e);
            }
            items
        }
        None => container.playlist_source().read(&args.source)?,
    };

    let mut playlist = Playlist::new(items);
    if let Some(pattern) = &args.filter {
        playlist.set_filter(pattern, false);
    }
    if args.shuffle {
        match args.seed {
            Some(seed) => playlist.set_order_with_rng(true, false, &mut StdRng::seed_from_u64(seed)),
            None => playlist.set_order(true, false),
        }
    }

    let view = PlaylistView {
        total: playlist.total_len(),
        visible: playlist.len(),
        items: playlist
            .playback_order()
            .map(|locator| locator.as_str().to_string())
            .collect(),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&view)
            .context("Failed to serialize playlist to JSON")?;
        println!("{}", json);
    } else {
        for (position, item) in view.items.iter().enumerate() {
            println!("{:>4}  {}", position + 1, item);
        }
        println!("{} of {} items", view.visible, view.total);
    }
    Ok(())
}

/// Execute the config command
pub fn config(config: &AppConfig) -> Result<()> {
    let text = config.to_toml()?;
    print!("{}", text);
    Ok(())
}
