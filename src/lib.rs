//! ClipMark library
//!
//! Marks time ranges in videos and exports them through ffmpeg cut chains:
//! stream copy, re-encoded precise cuts and forward/backward loops. A
//! playlist index provides filtering, shuffling and constant-time lookup
//! of the videos being worked on.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod playlist;
pub mod ports;
pub mod registry;
pub mod utils;

// Re-export commonly used types
pub use domain::errors::DomainError;
pub use domain::model::{CutMethod, MediaLocator, OperationState, Sequence, Time};
pub use engine::orchestrator::Orchestrator;
pub use error::{ClipMarkError, ClipMarkResult};
pub use playlist::Playlist;
pub use registry::SequenceRegistry;
