//! uploadq - Command-line driver for the upload queue.
//!
//! Queues files from disk, validates them one at a time as delimited text,
//! and "uploads" up to three at once into a destination directory, printing
//! progress to stderr.

mod checksums;
mod disk_file;
mod driver;
mod error;
mod logging;
mod report;
mod upload;
mod validate;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use queue::{FileHandle, FileRef, QueueState};
use tracing::debug;

use crate::checksums::ChecksumAlgorithm;
use crate::disk_file::DiskFile;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::report::CliReport;
use crate::upload::Uploader;
use crate::validate::Validator;

/// uploadq - Validate and upload files through a bounded queue
#[derive(Parser, Debug)]
#[command(name = "uploadq")]
#[command(version)]
#[command(about = "Validate delimited files and upload them with bounded concurrency")]
struct Args {
    /// Files to queue, in order
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Destination directory for uploads
    #[arg(long, value_name = "DIR")]
    dest: PathBuf,

    /// Checksum algorithm for validation stats: md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM", default_value = "sha256")]
    hash: String,

    /// Field delimiter
    #[arg(long, value_name = "CHAR", default_value = ",")]
    delimiter: char,

    /// Replace files that already exist in the destination
    #[arg(long)]
    overwrite: bool,

    /// Enable verbose output
    #[arg(long)]
    verbose: bool,

    /// Print the final queue snapshot as JSON on stdout
    #[arg(long)]
    json: bool,
}

/// Parse arguments, run the queue, and exit with 0 (all uploaded),
/// 1 (driver error), or 2 (some files failed).
fn main() {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    let exit_code = match run_cli(&args) {
        Ok(state) => finish(&state, args.json, &mut io::stdout().lock()),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

/// Print the snapshot if requested and pick the exit code for a finished run.
fn finish(state: &QueueState, json: bool, out: &mut impl Write) -> i32 {
    if json {
        let written = serde_json::to_writer_pretty(&mut *out, state)
            .map_err(io::Error::from)
            .and_then(|()| writeln!(out));
        if let Err(e) = written {
            eprintln!("Error: failed to write queue snapshot: {}", e);
            return 1;
        }
    }

    if state.items.iter().any(|item| item.status.is_failure()) {
        2
    } else {
        0
    }
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<QueueState, DriverError> {
    let algorithm: ChecksumAlgorithm = args.hash.parse().map_err(DriverError::InvalidArgument)?;

    let delimiter = u8::try_from(args.delimiter)
        .ok()
        .filter(|byte| byte.is_ascii())
        .ok_or_else(|| {
            DriverError::InvalidArgument("Delimiter must be a single ASCII character".to_string())
        })?;
    if delimiter == b'\n' || delimiter == b'\r' || delimiter == b'"' {
        return Err(DriverError::InvalidArgument(
            "Delimiter cannot be a line break or a quote".to_string(),
        ));
    }

    if args.dest.is_file() {
        return Err(DriverError::InvalidPath {
            path: args.dest.clone(),
            reason: "destination is a file".to_string(),
        });
    }

    let files = args
        .files
        .iter()
        .map(|path| {
            let file = DiskFile::from_path(path)?;
            debug!(file = file.name(), path = %file.path().display(), size = file.size(), "queued");
            Ok(Arc::new(file) as FileRef)
        })
        .collect::<Result<Vec<_>, DriverError>>()?;

    let driver = Driver::new(
        Validator::new(algorithm, delimiter),
        Uploader::new(&args.dest, args.overwrite),
    );
    let report = CliReport::new(args.verbose);

    Ok(driver.run(files, Some(&report)))
}
