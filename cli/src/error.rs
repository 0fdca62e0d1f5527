//! Error types for the upload driver.
//!
//! `DriverError` covers everything that can stop the driver or fail a single
//! file. Per-file failures never escape a worker: the worker turns them into a
//! `ValidationFailed` or `UploadFailed` event and only the message text ends
//! up in the queue.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    /// Input file does not exist
    #[error("Input file not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    /// Path exists but cannot be queued
    #[error("Invalid path: {} ({reason})", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Failed to read from a file
    #[error("Failed to read {name}: {source}")]
    ReadError {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to write to the destination
    #[error("Failed to write {}: {source}", .path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Destination file already exists and overwriting is off
    #[error("Destination already exists: {}", .path.display())]
    DestinationExists { path: PathBuf },

    /// Failed to create the destination directory
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File content is not acceptable
    #[error("{reason}")]
    MalformedFile { reason: String },

    /// Bad command-line value
    #[error("{0}")]
    InvalidArgument(String),
}

impl DriverError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        DriverError::MalformedFile {
            reason: reason.into(),
        }
    }
}
