//! Error handling module for ClipMark

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Main error type for ClipMark operations
#[derive(Error, Debug)]
pub enum ClipMarkError {
    /// Invalid time format
    #[error("Invalid time format: {time}. Expected HH:MM:SS.ms, MM:SS.ms, or seconds")]
    InvalidTimeFormat { time: String },

    /// Time range validation error
    #[error("Invalid time range: start ({start}) must be less than end ({end})")]
    InvalidTimeRange { start: String, end: String },

    /// Playlist source could not be read
    #[error("Playlist source error: {path}: {message}")]
    PlaylistSource { path: String, message: String },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A chain could not be built for a sequence
    #[error("Failed to build cut chain: {message}")]
    ChainBuild { message: String },

    /// Domain validation error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for ClipMark operations
pub type ClipMarkResult<T> = std::result::Result<T, ClipMarkError>;
