// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod playlist_file;
pub mod toml_config;
pub mod tracing_log;

// Re-export adapters
pub use exec_ffmpeg::FfmpegLauncher;
pub use playlist_file::{FolderCache, PlaylistFileReader};
pub use toml_config::TomlConfigAdapter;
pub use tracing_log::TracingObserver;
