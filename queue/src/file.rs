//! File handles.
//!
//! A queue never holds file contents. It holds a handle that knows the file's
//! name and size and can open a fresh reader over the full contents whenever
//! a worker asks for one (validation reads the file once, the upload reads it
//! again, and a retry would read it a third time).

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

/// A selectable file that can be streamed on demand.
///
/// Implementations must return a reader positioned at the start of the file
/// on every call to [`FileHandle::open`].
pub trait FileHandle: fmt::Debug + Send + Sync {
    /// File name; the identity of an item within a queue.
    fn name(&self) -> &str;

    /// Size in bytes.
    fn size(&self) -> u64;

    /// Open a new reader over the complete file contents.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// Shared reference to a file handle, as stored in queue items.
pub type FileRef = Arc<dyn FileHandle>;

/// A file held in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        MemoryFile {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Wrap this file into a [`FileRef`].
    pub fn shared(self) -> FileRef {
        Arc::new(self)
    }
}

impl FileHandle for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }
}
