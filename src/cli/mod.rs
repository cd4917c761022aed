//! CLI module for ClipMark
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

pub use args::{CutArgs, PlaylistArgs};

/// ClipMark headless cutter
///
/// Marks time ranges in a video and exports them with ffmpeg, either as a
/// stream copy, a re-encoded precise cut or a forward/backward loop.
#[derive(Parser, Debug)]
#[command(name = "clipmark")]
#[command(about = "ClipMark - mark ranges in videos and cut them with ffmpeg")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: $CLIPMARK_CONFIG, then ./clipmark.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// ffmpeg binary to run
    #[arg(long, global = true)]
    pub ffmpeg: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cut one or more ranges out of a video
    Cut(args::CutArgs),
    /// Print the playback order of a playlist, folder or file
    Playlist(args::PlaylistArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::CutMethod;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cut_command() {
        let cli = Cli::try_parse_from([
            "clipmark", "--ffmpeg", "/opt/ffmpeg", "cut", "-i", "in.mp4", "-r", "0-5", "-r",
            "10..12", "--method", "loop", "--loop-count", "3",
        ])
        .unwrap();
        assert_eq!(cli.ffmpeg, Some(PathBuf::from("/opt/ffmpeg")));
        match cli.command {
            Commands::Cut(args) => {
                assert_eq!(args.ranges, vec!["0-5", "10..12"]);
                assert_eq!(args.method, CutMethod::Loop);
                assert_eq!(args.loop_count, Some(3));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        let result = Cli::try_parse_from(["clipmark", "cut", "-i", "in.mp4", "-r", "0-5", "--method", "hybrid"]);
        assert!(result.is_err());
    }
}
