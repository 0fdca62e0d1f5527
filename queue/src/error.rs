//! Invariant violations.
//!
//! The transition function itself never fails. `InvariantViolation` describes
//! a queue snapshot that breaks one of the scheduling invariants; it is
//! returned by [`QueueState::check_invariants`](crate::QueueState::check_invariants)
//! so that drivers and tests can audit snapshots they did not build through
//! `transition` (hand-assembled fixtures, deserialized state, and so on).

use std::error::Error;
use std::fmt::{self, Display};

/// A broken queue invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Two items share a file name
    DuplicateName { name: String },

    /// More than one item is validating
    MultipleValidating { count: usize },

    /// More items are uploading than the upload pool allows
    TooManyUploading { count: usize, limit: usize },

    /// `validating` does not point at the validating item
    ValidatingMismatch {
        expected: Option<String>,
        actual: Option<String>,
    },

    /// `uploading` does not list exactly the uploading items
    UploadingMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },
}

impl Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { name } => {
                write!(f, "Duplicate item name: {}", name)
            }
            Self::MultipleValidating { count } => {
                write!(f, "{} items are validating (at most 1 allowed)", count)
            }
            Self::TooManyUploading { count, limit } => {
                write!(f, "{} items are uploading (at most {} allowed)", count, limit)
            }
            Self::ValidatingMismatch { expected, actual } => {
                write!(
                    f,
                    "Validating slot is {:?} but validating item is {:?}",
                    actual, expected
                )
            }
            Self::UploadingMismatch { expected, actual } => {
                write!(
                    f,
                    "Uploading set is {:?} but uploading items are {:?}",
                    actual, expected
                )
            }
        }
    }
}

impl Error for InvariantViolation {}
