//! Upload sink.
//!
//! Uploads land in a destination directory, one file per queue item, named
//! after the item. Data is written to an anonymous temporary file in the
//! destination directory and moved into place once complete, so a failed
//! upload never leaves a truncated file under the final name. Without
//! `overwrite` the move refuses to replace a file that appeared meanwhile.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use queue::FileHandle;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::DriverError;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct Uploader {
    destination: PathBuf,
    overwrite: bool,
}

impl Uploader {
    pub fn new(destination: impl Into<PathBuf>, overwrite: bool) -> Self {
        Uploader {
            destination: destination.into(),
            overwrite,
        }
    }

    /// Where `name` ends up.
    pub fn target_path(&self, name: &str) -> Result<PathBuf, DriverError> {
        let relative = Path::new(name);
        let plain = relative.components().count() == 1
            && relative.file_name().map(|n| n == relative.as_os_str()).unwrap_or(false);
        if !plain {
            return Err(DriverError::InvalidPath {
                path: relative.to_path_buf(),
                reason: "upload name must be a plain file name".to_string(),
            });
        }
        Ok(self.destination.join(relative))
    }

    /// Upload `file`, reporting the fraction written through `on_progress`.
    ///
    /// Returns the number of bytes written.
    pub fn upload(
        &self,
        file: &dyn FileHandle,
        mut on_progress: impl FnMut(f64),
    ) -> Result<u64, DriverError> {
        let target = self.target_path(file.name())?;
        if !self.overwrite && target.exists() {
            return Err(DriverError::DestinationExists { path: target });
        }
        ensure_dir_exists(&self.destination)?;

        // Dropping the temporary file on any error path deletes it.
        let mut partial =
            NamedTempFile::new_in(&self.destination).map_err(|e| DriverError::WriteError {
                path: self.destination.clone(),
                source: e,
            })?;
        let written = self.copy_into(file, &mut partial, &mut on_progress)?;

        let persisted = if self.overwrite {
            partial.persist(&target)
        } else {
            partial.persist_noclobber(&target)
        };
        persisted.map_err(|e| match e.error.kind() {
            io::ErrorKind::AlreadyExists => DriverError::DestinationExists {
                path: target.clone(),
            },
            _ => DriverError::WriteError {
                path: target.clone(),
                source: e.error,
            },
        })?;

        debug!(file = file.name(), bytes = written, target = %target.display(), "uploaded");
        Ok(written)
    }

    fn copy_into(
        &self,
        file: &dyn FileHandle,
        partial: &mut NamedTempFile,
        on_progress: &mut impl FnMut(f64),
    ) -> Result<u64, DriverError> {
        let path = partial.path().to_path_buf();
        let read_error = |source| DriverError::ReadError {
            name: file.name().to_string(),
            source,
        };
        let write_error = |source| DriverError::WriteError {
            path: path.clone(),
            source,
        };

        let mut reader = file.open().map_err(read_error)?;
        let mut writer = io::BufWriter::new(partial.as_file_mut());
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;

        loop {
            let n = reader.read(&mut buffer).map_err(read_error)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buffer[..n]).map_err(write_error)?;
            written += n as u64;
            if file.size() > 0 {
                on_progress((written as f64 / file.size() as f64).min(1.0));
            }
        }
        writer.flush().map_err(write_error)?;

        Ok(written)
    }
}

/// Ensure `dir` exists as a directory, creating it if necessary.
fn ensure_dir_exists(dir: &Path) -> Result<(), DriverError> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(DriverError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "Destination exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| DriverError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(DriverError::DirectoryCreationFailed {
            path: dir.to_path_buf(),
            source: e,
        }),
    }
}
