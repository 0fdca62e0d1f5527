//! # Upload Queue - Client-Side Upload State Machine
//!
//! A pure state machine for a multi-file upload queue. It tracks each
//! selected file from selection through validation and upload, and decides
//! which files may be validated or uploaded at any moment.
//!
//! ## Overview
//!
//! The queue performs no I/O of its own. A driver (UI, CLI, service) holds
//! the current [`QueueState`], dispatches [`Event`]s through [`transition`],
//! and starts work for whatever the new snapshot lists:
//! - one file at a time in the validating slot (`state.validating`)
//! - up to [`MAX_CONCURRENT_UPLOADS`] files in the upload pool (`state.uploading`)
//!
//! Workers report back with completion events, applied one at a time.
//!
//! ## Basic Usage
//!
//! ```
//! use queue::{reset, transition, Event, FileStats, MemoryFile, Status};
//!
//! let state = reset();
//! let state = transition(
//!     &state,
//!     Event::append_files([MemoryFile::new("users.csv", "id,name\n1,ada\n").shared()]),
//! );
//! assert_eq!(state.validating_name(), Some("users.csv"));
//!
//! let stats = FileStats {
//!     hash: "sha256:...".to_string(),
//!     row_count: 1,
//!     columns: vec!["id".to_string(), "name".to_string()],
//! };
//! let state = transition(&state, Event::validation_succeeded("users.csv", stats));
//! assert_eq!(state.uploading_names(), vec!["users.csv"]);
//!
//! let state = transition(&state, Event::upload_succeeded("users.csv"));
//! assert_eq!(state.items[0].status, Status::UploadSucceeded);
//! assert!(state.is_idle());
//! ```
//!
//! ## Modules
//!
//! - **model**: Snapshot types (QueueState, Item, Status, FileStats)
//! - **file**: File handle trait and an in-memory implementation
//! - **event**: Events and their constructors
//! - **transition**: The transition function
//! - **scheduler**: Slot scheduling and derived-field recomputation
//! - **error**: Invariant violations reported by snapshot audits

pub mod model;
pub mod file;
pub mod event;
pub mod transition;
pub mod scheduler;
pub mod error;

// Re-export main types and functions
pub use model::{reset, FileStats, Item, QueueState, Status, MAX_CONCURRENT_UPLOADS};
pub use file::{FileHandle, FileRef, MemoryFile};
pub use event::Event;
pub use transition::transition;
pub use scheduler::schedule;
pub use error::InvariantViolation;
