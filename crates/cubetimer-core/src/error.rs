//! Core error types for cubetimer-core.
//!
//! This module defines the error hierarchy using thiserror. None of these
//! errors is fatal to the stopwatch: collaborator failures are reported as
//! events and the engine keeps cycling.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for cubetimer-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Scramble generation failed
    #[error("Scramble error: {0}")]
    Scramble(#[from] ScrambleError),

    /// Solve persistence failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] SinkError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The runtime task is gone
    #[error("Stopwatch runtime has shut down")]
    RuntimeClosed,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors produced by a [`ScrambleSource`](crate::scramble::ScrambleSource).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrambleError {
    /// The generator could not produce a scramble for the puzzle.
    #[error("Scramble unavailable for puzzle {puzzle_type}/{subtype}: {reason}")]
    Unavailable {
        puzzle_type: u32,
        subtype: u32,
        reason: String,
    },
}

/// Errors produced by a [`SolveSink`](crate::sink::SolveSink).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The sink rejected or failed to store the record.
    #[error("Failed to persist solve {solve_id}: {reason}")]
    PersistenceFailure { solve_id: uuid::Uuid, reason: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Data directory could not be determined or created
    #[error("Configuration directory unavailable: {0}")]
    DirUnavailable(String),
}

/// Malformed touch input. Always recoverable; the classifier drops the sample.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureError {
    /// A move or release arrived with no active contact.
    #[error("{phase:?} sample without a matching press")]
    InvalidSequence { phase: crate::gesture::TouchPhase },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
