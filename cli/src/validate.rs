//! File validation.
//!
//! A file is valid when it is non-empty UTF-8 delimited text whose first
//! record names the columns and whose remaining records all have one field
//! per column. Quoting follows RFC 4180. Validation streams the file exactly
//! once: each chunk is hashed as it passes into the CSV reader, so memory use
//! does not grow with file size.

use std::io::{self, Read};

use queue::{FileHandle, FileStats};
use tracing::debug;

use crate::checksums::{create_hasher, ChecksumAlgorithm, ChecksumHasher};
use crate::error::DriverError;

const CHUNK_SIZE: usize = 64 * 1024;

/// Validation settings.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    pub algorithm: ChecksumAlgorithm,
    pub delimiter: u8,
}

impl Validator {
    pub fn new(algorithm: ChecksumAlgorithm, delimiter: u8) -> Self {
        Validator {
            algorithm,
            delimiter,
        }
    }

    /// Validate `file`, reporting the fraction read through `on_progress`.
    pub fn validate(
        &self,
        file: &dyn FileHandle,
        on_progress: impl FnMut(f64),
    ) -> Result<FileStats, DriverError> {
        let source = file.open().map_err(|source| DriverError::ReadError {
            name: file.name().to_string(),
            source,
        })?;
        let reader = HashingReader {
            inner: source,
            hasher: create_hasher(self.algorithm),
            read: 0,
            size: file.size(),
            first_byte: None,
            on_progress,
        };

        let mut records = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(false)
            .buffer_capacity(CHUNK_SIZE)
            .from_reader(reader);

        let columns: Vec<String> = records
            .headers()
            .map_err(|e| record_error(file.name(), e))?
            .iter()
            .map(|column| column.trim().to_string())
            .collect();

        match records.get_ref().first_byte {
            None => return Err(DriverError::malformed("file is empty")),
            Some(b'\n' | b'\r') => return Err(DriverError::malformed("missing header line")),
            Some(_) => {}
        }
        if let Some(position) = columns.iter().position(|column| column.is_empty()) {
            return Err(DriverError::malformed(format!(
                "column {} has no name",
                position + 1
            )));
        }

        let mut record = csv::StringRecord::new();
        let mut row_count = 0u64;
        while records
            .read_record(&mut record)
            .map_err(|e| record_error(file.name(), e))?
        {
            row_count += 1;
        }

        let checksum = records.into_inner().hasher.finalize();
        debug!(
            file = file.name(),
            algorithm = %checksum.algorithm(),
            row_count,
            columns = columns.len(),
            "validated"
        );

        Ok(FileStats {
            hash: checksum.to_string_with_algo(),
            row_count,
            columns,
        })
    }
}

/// Hashes and counts bytes on their way to the CSV reader.
struct HashingReader<R, F> {
    inner: R,
    hasher: Box<dyn ChecksumHasher>,
    read: u64,
    size: u64,
    first_byte: Option<u8>,
    on_progress: F,
}

impl<R: Read, F: FnMut(f64)> Read for HashingReader<R, F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.first_byte.get_or_insert(buf[0]);
            self.hasher.update(&buf[..n]);
            self.read += n as u64;
            if self.size > 0 {
                (self.on_progress)((self.read as f64 / self.size as f64).min(1.0));
            }
        }
        Ok(n)
    }
}

fn record_error(name: &str, err: csv::Error) -> DriverError {
    if err.is_io_error() {
        return DriverError::ReadError {
            name: name.to_string(),
            source: io::Error::from(err),
        };
    }

    let line = |pos: &Option<csv::Position>| pos.as_ref().map(|pos| pos.line()).unwrap_or(0);
    let reason = match err.kind() {
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => format!(
            "line {} has {} fields, expected {}",
            line(pos),
            len,
            expected_len
        ),
        csv::ErrorKind::Utf8 { pos, err: utf8 } => format!(
            "invalid encoding on line {}, field {}",
            line(pos),
            utf8.field() + 1
        ),
        _ => err.to_string(),
    };
    DriverError::malformed(reason)
}
