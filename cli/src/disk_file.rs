//! File handles backed by the local filesystem.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use queue::FileHandle;

use crate::error::DriverError;

/// A file on disk, queued under its file name.
///
/// The size is captured when the handle is created; each `open` reopens the
/// path, so repeated reads see the file's current contents.
#[derive(Debug, Clone)]
pub struct DiskFile {
    name: String,
    path: PathBuf,
    size: u64,
}

impl DiskFile {
    pub fn from_path(path: &Path) -> Result<Self, DriverError> {
        let metadata = fs::metadata(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                DriverError::InputNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                DriverError::ReadError {
                    name: path.display().to_string(),
                    source: e,
                }
            }
        })?;

        if !metadata.is_file() {
            return Err(DriverError::InvalidPath {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DriverError::InvalidPath {
                path: path.to_path_buf(),
                reason: "file name is not valid UTF-8".to_string(),
            })?
            .to_string();

        Ok(DiskFile {
            name,
            path: path.to_path_buf(),
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileHandle for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(&self.path)?))
    }
}
