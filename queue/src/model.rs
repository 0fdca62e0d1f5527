//! Core data model for the upload queue.
//!
//! This module defines the snapshot types the transition function works on:
//! - QueueState: every tracked file plus the derived scheduling fields
//! - Item: a single file within the queue
//! - Status, FileStats: per-item lifecycle and validation result

use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::error::InvariantViolation;
use crate::file::FileRef;

/// Maximum number of items uploading at once.
pub const MAX_CONCURRENT_UPLOADS: usize = 3;

/// Lifecycle status of a queued file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    /// Selected, waiting for the validating slot
    Waiting,
    /// Holding the validating slot
    Validating,
    /// Validation rejected the file
    ValidationFailed,
    /// Validated; waiting for an upload slot
    ValidationSucceeded,
    /// Holding an upload slot
    Uploading,
    /// Upload finished
    UploadSucceeded,
    /// Upload rejected or interrupted
    UploadFailed,
}

impl Status {
    /// Returns true if no scheduler step will move an item out of this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Status::ValidationFailed | Status::UploadSucceeded | Status::UploadFailed
        )
    }

    /// Returns true for the two `*Failed` statuses.
    pub fn is_failure(&self) -> bool {
        matches!(self, Status::ValidationFailed | Status::UploadFailed)
    }

    /// Name used in serialized snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Waiting => "waiting",
            Status::Validating => "validating",
            Status::ValidationFailed => "validationFailed",
            Status::ValidationSucceeded => "validationSucceeded",
            Status::Uploading => "uploading",
            Status::UploadSucceeded => "uploadSucceeded",
            Status::UploadFailed => "uploadFailed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    /// Content hash
    pub hash: String,
    /// Number of data rows
    pub row_count: u64,
    /// Column names, in file order
    pub columns: Vec<String>,
}

/// One tracked file.
#[derive(Debug, Clone)]
pub struct Item {
    /// The file; never replaced once the item exists
    pub file: FileRef,

    /// Fraction of the current phase completed, in [0, 1]
    pub progress: f64,

    /// Current lifecycle status
    pub status: Status,

    /// Set once validation succeeds
    pub stats: Option<FileStats>,

    /// Failure message for `*Failed` statuses
    pub err: Option<String>,
}

impl Item {
    /// A freshly selected item: waiting, no progress.
    pub fn new(file: FileRef) -> Self {
        Item {
            file,
            progress: 0.0,
            status: Status::Waiting,
            stats: None,
            err: None,
        }
    }

    pub fn name(&self) -> &str {
        self.file.name()
    }

    /// Copy of this item with a different status.
    pub fn with_status(&self, status: Status) -> Self {
        Item {
            status,
            ..self.clone()
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.file.name() == other.file.name()
            && self.file.size() == other.file.size()
            && self.progress == other.progress
            && self.status == other.status
            && self.stats == other.stats
            && self.err == other.err
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = 4 + usize::from(self.stats.is_some()) + usize::from(self.err.is_some());
        let mut s = serializer.serialize_struct("Item", fields)?;
        s.serialize_field("name", self.name())?;
        s.serialize_field("size", &self.file.size())?;
        s.serialize_field("progress", &self.progress)?;
        s.serialize_field("status", &self.status)?;
        if let Some(stats) = &self.stats {
            s.serialize_field("stats", stats)?;
        }
        if let Some(err) = &self.err {
            s.serialize_field("err", err)?;
        }
        s.end()
    }
}

/// Immutable snapshot of the whole queue.
///
/// Items are shared between snapshots: a transition replaces the `Arc` of an
/// item it changes and reuses every other one, so `Arc::ptr_eq` tells a
/// consumer whether an item changed.
#[derive(Debug, Clone, Default)]
pub struct QueueState {
    /// All items in selection order
    pub items: Vec<Arc<Item>>,

    /// File of the item holding the validating slot (derived)
    pub validating: Option<FileRef>,

    /// Items holding upload slots, in queue order (derived)
    pub uploading: Option<Vec<Arc<Item>>>,
}

/// The canonical empty queue.
pub fn reset() -> QueueState {
    QueueState::default()
}

impl QueueState {
    /// Look up an item by file name.
    pub fn get(&self, name: &str) -> Option<&Arc<Item>> {
        self.items.iter().find(|item| item.name() == name)
    }

    /// Index of the item with the given file name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name() == name)
    }

    /// Number of items with the given status.
    pub fn count(&self, status: Status) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    /// Returns true when no item is waiting for or holding a slot.
    pub fn is_idle(&self) -> bool {
        self.items.iter().all(|item| {
            !matches!(
                item.status,
                Status::Waiting | Status::Validating | Status::ValidationSucceeded | Status::Uploading
            )
        })
    }

    /// Name of the file in the validating slot.
    pub fn validating_name(&self) -> Option<&str> {
        self.validating.as_ref().map(|file| file.name())
    }

    /// Names of the items in the uploading set.
    pub fn uploading_names(&self) -> Vec<&str> {
        self.uploading
            .iter()
            .flatten()
            .map(|item| item.name())
            .collect()
    }

    /// Check the scheduling invariants, returning the first one broken.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for (index, item) in self.items.iter().enumerate() {
            if self.items[..index].iter().any(|prev| prev.name() == item.name()) {
                return Err(InvariantViolation::DuplicateName {
                    name: item.name().to_string(),
                });
            }
        }

        let validating: Vec<&Arc<Item>> = self
            .items
            .iter()
            .filter(|item| item.status == Status::Validating)
            .collect();
        if validating.len() > 1 {
            return Err(InvariantViolation::MultipleValidating {
                count: validating.len(),
            });
        }
        let expected = validating.first().map(|item| item.name().to_string());
        let actual = self.validating_name().map(str::to_string);
        if expected != actual {
            return Err(InvariantViolation::ValidatingMismatch { expected, actual });
        }

        let uploading: Vec<String> = self
            .items
            .iter()
            .filter(|item| item.status == Status::Uploading)
            .map(|item| item.name().to_string())
            .collect();
        if uploading.len() > MAX_CONCURRENT_UPLOADS {
            return Err(InvariantViolation::TooManyUploading {
                count: uploading.len(),
                limit: MAX_CONCURRENT_UPLOADS,
            });
        }
        let listed: Vec<String> = self
            .uploading
            .iter()
            .flatten()
            .map(|item| item.name().to_string())
            .collect();
        let consistent = self
            .uploading
            .iter()
            .flatten()
            .all(|item| self.get(item.name()).is_some_and(|current| **current == **item));
        if listed != uploading || !consistent {
            return Err(InvariantViolation::UploadingMismatch {
                expected: uploading,
                actual: listed,
            });
        }

        Ok(())
    }
}

impl PartialEq for QueueState {
    fn eq(&self, other: &Self) -> bool {
        self.items.len() == other.items.len()
            && self.items.iter().zip(&other.items).all(|(a, b)| **a == **b)
            && self.validating_name() == other.validating_name()
            && self.uploading.is_some() == other.uploading.is_some()
            && self.uploading_names() == other.uploading_names()
    }
}

impl Serialize for QueueState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields =
            1 + usize::from(self.validating.is_some()) + usize::from(self.uploading.is_some());
        let mut s = serializer.serialize_struct("QueueState", fields)?;
        s.serialize_field("items", &self.items)?;
        if let Some(name) = self.validating_name() {
            s.serialize_field("validating", name)?;
        }
        if self.uploading.is_some() {
            s.serialize_field("uploading", &self.uploading_names())?;
        }
        s.end()
    }
}
