// Domain errors - Error types for the domain layer

use std::fmt;

/// Domain-specific error types
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid arguments provided
    BadArgs(String),
    /// Invalid time range
    InvalidTimeRange(String),
    /// Referenced entity does not exist
    NotFound(String),
    /// Unknown cut method name
    UnknownCutMethod(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::BadArgs(msg) => write!(f, "Bad arguments: {}", msg),
            DomainError::InvalidTimeRange(msg) => write!(f, "Invalid time range: {}", msg),
            DomainError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DomainError::UnknownCutMethod(name) => {
                write!(f, "Unknown cut method '{}' (expected fast, precise or loop)", name)
            }
        }
    }
}

impl std::error::Error for DomainError {}
