//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

use crate::domain::model::CutMethod;

/// Arguments for the cut command
#[derive(Args, Debug)]
pub struct CutArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Range to cut, `start-end` or `start..end` (HH:MM:SS.ms, MM:SS.ms or seconds)
    #[arg(short, long = "range", required = true)]
    pub ranges: Vec<String>,

    /// Cut method: fast (stream copy), precise (re-encode) or loop
    #[arg(short, long, default_value = "fast")]
    pub method: CutMethod,

    /// Forward/backward pairs in a loop export
    #[arg(long)]
    pub loop_count: Option<u32>,

    /// Export folder (default: next to the input)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Kill any ffmpeg stage running longer than this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Print live progress lines
    #[arg(long)]
    pub progress: bool,

    /// Output events and the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the playlist command
#[derive(Args, Debug)]
pub struct PlaylistArgs {
    /// Playlist file (.mpl), folder or single video
    #[arg(short, long)]
    pub source: PathBuf,

    /// Keep only names matching this pattern (regex, case-insensitive)
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Shuffle the playback order
    #[arg(long)]
    pub shuffle: bool,

    /// Seed for a reproducible shuffle
    #[arg(long, requires = "shuffle")]
    pub seed: Option<u64>,

    /// Folder listing cache file
    #[arg(long)]
    pub cache: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
