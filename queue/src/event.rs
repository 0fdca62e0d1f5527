//! Events accepted by the transition function.
//!
//! Workers and UI code build events with the constructor functions below.
//! Failure events only ever carry message text: the constructors take any
//! `Display` value, so a structured error is reduced to its message before it
//! reaches the queue.

use std::fmt::Display;

use crate::file::FileRef;
use crate::model::FileStats;

/// One change to apply to a queue.
#[derive(Debug, Clone)]
pub enum Event {
    /// Files selected by the user
    AppendFiles { files: Vec<FileRef> },

    /// Work on a file advanced
    Progress { filename: String, progress: f64 },

    /// Validation of a file finished successfully
    ValidationSucceeded { filename: String, stats: FileStats },

    /// Validation of a file failed
    ValidationFailed { filename: String, err: String },

    /// Upload of a file finished successfully
    UploadSucceeded { filename: String },

    /// Upload of a file failed
    UploadFailed { filename: String, err: String },

    /// The user removed a file from the queue
    RemoveFile { filename: String },
}

impl Event {
    pub fn append_files(files: impl IntoIterator<Item = FileRef>) -> Self {
        Event::AppendFiles {
            files: files.into_iter().collect(),
        }
    }

    pub fn progress(filename: impl Into<String>, progress: f64) -> Self {
        Event::Progress {
            filename: filename.into(),
            progress,
        }
    }

    pub fn validation_succeeded(filename: impl Into<String>, stats: FileStats) -> Self {
        Event::ValidationSucceeded {
            filename: filename.into(),
            stats,
        }
    }

    /// Validation failure; only the message text of `err` is kept.
    pub fn validation_failed(filename: impl Into<String>, err: impl Display) -> Self {
        Event::ValidationFailed {
            filename: filename.into(),
            err: err.to_string(),
        }
    }

    pub fn upload_succeeded(filename: impl Into<String>) -> Self {
        Event::UploadSucceeded {
            filename: filename.into(),
        }
    }

    /// Upload failure; only the message text of `err` is kept.
    pub fn upload_failed(filename: impl Into<String>, err: impl Display) -> Self {
        Event::UploadFailed {
            filename: filename.into(),
            err: err.to_string(),
        }
    }

    pub fn remove_file(filename: impl Into<String>) -> Self {
        Event::RemoveFile {
            filename: filename.into(),
        }
    }

    /// Short event name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::AppendFiles { .. } => "append_files",
            Event::Progress { .. } => "progress",
            Event::ValidationSucceeded { .. } => "validation_succeeded",
            Event::ValidationFailed { .. } => "validation_failed",
            Event::UploadSucceeded { .. } => "upload_succeeded",
            Event::UploadFailed { .. } => "upload_failed",
            Event::RemoveFile { .. } => "remove_file",
        }
    }

    /// The file an event targets; `None` for `AppendFiles`.
    pub fn filename(&self) -> Option<&str> {
        match self {
            Event::AppendFiles { .. } => None,
            Event::Progress { filename, .. }
            | Event::ValidationSucceeded { filename, .. }
            | Event::ValidationFailed { filename, .. }
            | Event::UploadSucceeded { filename }
            | Event::UploadFailed { filename, .. }
            | Event::RemoveFile { filename } => Some(filename),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_failure_keeps_message_text_only() {
        let err = io::Error::new(io::ErrorKind::InvalidData, "invalid csv format");
        match Event::validation_failed("file2.txt", err) {
            Event::ValidationFailed { filename, err } => {
                assert_eq!(filename, "file2.txt");
                assert_eq!(err, "invalid csv format");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_failure_accepts_plain_strings() {
        match Event::upload_failed("file1.txt", "connection reset") {
            Event::UploadFailed { err, .. } => assert_eq!(err, "connection reset"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_event_filename_and_kind() {
        assert_eq!(Event::remove_file("a").filename(), Some("a"));
        assert_eq!(Event::append_files(Vec::<FileRef>::new()).filename(), None);
        assert_eq!(Event::upload_succeeded("a").kind(), "upload_succeeded");
    }
}
