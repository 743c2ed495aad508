//! Error types for chanstat-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the chanstat-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The log source could not be opened
    #[error("failed to open log file {path}: {source}")]
    LogOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Parse error for a log format
    #[error("parse error in {format} log: {message}")]
    Parse { format: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// URL extraction error
    #[error("URL error: {0}")]
    Url(String),
}

/// Result type alias for chanstat-core
pub type Result<T> = std::result::Result<T, Error>;
