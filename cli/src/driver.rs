//! The dispatch loop.
//!
//! The driver is the single writer of the queue state. After each
//! transition it starts a worker thread for every file that newly holds the
//! validating slot or an upload slot. Workers never touch the state: they
//! send `Progress` and completion events over a channel, and the driver
//! applies those events one at a time in arrival order. Every worker sends
//! exactly one completion event, even if it panics, so the loop always
//! drains.

use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use queue::{reset, transition, Event, FileRef, QueueState};
use tracing::{debug, info, warn};

use crate::report::QueueObserver;
use crate::upload::Uploader;
use crate::validate::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Phase {
    Validate,
    Upload,
}

pub struct Driver {
    validator: Arc<Validator>,
    uploader: Arc<Uploader>,
}

impl Driver {
    pub fn new(validator: Validator, uploader: Uploader) -> Self {
        Driver {
            validator: Arc::new(validator),
            uploader: Arc::new(uploader),
        }
    }

    /// Queue `files` and run until every item has reached a terminal status.
    pub fn run(&self, files: Vec<FileRef>, observer: Option<&dyn QueueObserver>) -> QueueState {
        let (tx, rx) = unbounded::<Event>();
        let mut started: HashSet<(Phase, String)> = HashSet::new();
        let mut active = 0usize;

        let mut state = transition(&reset(), Event::append_files(files));
        if let Some(observer) = observer {
            observer.on_started(&state);
        }
        info!(files = state.items.len(), "queue started");

        loop {
            active += self.launch(&state, &mut started, &tx);

            if state.is_idle() {
                break;
            }
            if active == 0 {
                warn!("queue is not idle but no work is running");
                break;
            }

            // `tx` is held here, so the channel stays connected and `active`
            // alone decides when to stop waiting.
            let Ok(event) = rx.recv() else {
                break;
            };
            if is_completion(&event) {
                active -= 1;
            }

            debug!(event = event.kind(), file = ?event.filename(), "applying event");
            let next = transition(&state, event);
            if let Err(violation) = next.check_invariants() {
                warn!(%violation, "queue invariant broken");
            }
            if let Some(observer) = observer {
                observer.on_transition(&state, &next);
            }
            state = next;
        }

        info!("queue drained");
        if let Some(observer) = observer {
            observer.on_finished(&state);
        }
        state
    }

    /// Start workers for slots that have none yet; returns how many started.
    fn launch(
        &self,
        state: &QueueState,
        started: &mut HashSet<(Phase, String)>,
        tx: &Sender<Event>,
    ) -> usize {
        let mut count = 0;

        if let Some(file) = &state.validating {
            if started.insert((Phase::Validate, file.name().to_string())) {
                self.spawn_validation(Arc::clone(file), tx.clone());
                count += 1;
            }
        }

        for item in state.uploading.iter().flatten() {
            if started.insert((Phase::Upload, item.name().to_string())) {
                self.spawn_upload(Arc::clone(&item.file), tx.clone());
                count += 1;
            }
        }

        count
    }

    fn spawn_validation(&self, file: FileRef, tx: Sender<Event>) {
        let validator = Arc::clone(&self.validator);
        debug!(file = file.name(), "starting validation");
        thread::spawn(move || {
            let name = file.name().to_string();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                validator.validate(&*file, |progress| {
                    let _ = tx.send(Event::progress(name.clone(), progress));
                })
            }));
            let event = match result {
                Ok(Ok(stats)) => Event::validation_succeeded(name, stats),
                Ok(Err(e)) => Event::validation_failed(name, e),
                Err(payload) => Event::validation_failed(name, panic_message(&*payload)),
            };
            let _ = tx.send(event);
        });
    }

    fn spawn_upload(&self, file: FileRef, tx: Sender<Event>) {
        let uploader = Arc::clone(&self.uploader);
        debug!(file = file.name(), "starting upload");
        thread::spawn(move || {
            let name = file.name().to_string();
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                uploader.upload(&*file, |progress| {
                    let _ = tx.send(Event::progress(name.clone(), progress));
                })
            }));
            let event = match result {
                Ok(Ok(_)) => Event::upload_succeeded(name),
                Ok(Err(e)) => Event::upload_failed(name, e),
                Err(payload) => Event::upload_failed(name, panic_message(&*payload)),
            };
            let _ = tx.send(event);
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    warn!(detail, "worker panicked");
    format!("worker panicked: {}", detail)
}

fn is_completion(event: &Event) -> bool {
    matches!(
        event,
        Event::ValidationSucceeded { .. }
            | Event::ValidationFailed { .. }
            | Event::UploadSucceeded { .. }
            | Event::UploadFailed { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksums::ChecksumAlgorithm;
    use queue::{FileHandle, MemoryFile, Status};
    use std::fs;
    use std::sync::Mutex;

    struct RecordingObserver {
        calls: Mutex<Vec<String>>,
        max_uploading: Mutex<usize>,
    }

    impl RecordingObserver {
        fn new() -> Self {
            RecordingObserver {
                calls: Mutex::new(Vec::new()),
                max_uploading: Mutex::new(0),
            }
        }
    }

    impl QueueObserver for RecordingObserver {
        fn on_started(&self, _state: &QueueState) {
            self.calls.lock().unwrap().push("on_started".to_string());
        }

        fn on_transition(&self, _previous: &QueueState, next: &QueueState) {
            let mut max = self.max_uploading.lock().unwrap();
            *max = (*max).max(next.count(Status::Uploading));
            assert!(next.count(Status::Validating) <= 1);
            assert!(next.check_invariants().is_ok());
        }

        fn on_finished(&self, _state: &QueueState) {
            self.calls.lock().unwrap().push("on_finished".to_string());
        }
    }

    fn driver(dest: &std::path::Path) -> Driver {
        Driver::new(
            Validator::new(ChecksumAlgorithm::Sha256, b','),
            Uploader::new(dest, false),
        )
    }

    #[test]
    fn test_run_uploads_valid_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dest = temp_dir.path().join("out");
        let files: Vec<FileRef> = (1..=5)
            .map(|i| MemoryFile::new(format!("file{}.csv", i), format!("id,n\n{},x\n", i)).shared())
            .collect();
        let observer = RecordingObserver::new();

        let state = driver(&dest).run(files, Some(&observer));

        assert!(state.is_idle());
        assert_eq!(state.count(Status::UploadSucceeded), 5);
        assert!(state.validating.is_none());
        assert!(state.uploading.is_none());
        for i in 1..=5 {
            let uploaded = fs::read_to_string(dest.join(format!("file{}.csv", i)))
                .expect("Uploaded file should exist");
            assert_eq!(uploaded, format!("id,n\n{},x\n", i));
        }
        let item = state.get("file3.csv").expect("Item should exist");
        assert_eq!(item.progress, 1.0);
        assert_eq!(item.stats.as_ref().map(|s| s.row_count), Some(1));
        assert!(*observer.max_uploading.lock().unwrap() <= 3);
        assert_eq!(
            *observer.calls.lock().unwrap(),
            vec!["on_started".to_string(), "on_finished".to_string()]
        );
    }

    #[test]
    fn test_run_records_failures_as_messages() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dest = temp_dir.path().join("out");
        fs::create_dir(&dest).expect("Failed to create dest");
        fs::write(dest.join("taken.csv"), "old").expect("Failed to write file");

        let files = vec![
            MemoryFile::new("good.csv", "a,b\n1,2\n").shared(),
            MemoryFile::new("ragged.csv", "a,b\n1\n").shared(),
            MemoryFile::new("taken.csv", "a\n1\n").shared(),
        ];

        let state = driver(&dest).run(files, None);

        let status = |name: &str| state.get(name).map(|item| item.status);
        assert_eq!(status("good.csv"), Some(Status::UploadSucceeded));
        assert_eq!(status("ragged.csv"), Some(Status::ValidationFailed));
        assert_eq!(status("taken.csv"), Some(Status::UploadFailed));
        assert_eq!(
            state.get("ragged.csv").and_then(|item| item.err.clone()),
            Some("line 2 has 1 fields, expected 2".to_string())
        );
        assert!(state
            .get("taken.csv")
            .and_then(|item| item.err.clone())
            .is_some_and(|err| err.starts_with("Destination already exists")));
    }

    #[test]
    fn test_run_with_no_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let state = driver(temp_dir.path()).run(Vec::new(), None);
        assert!(state.items.is_empty());
    }

    #[derive(Debug)]
    struct PanickingFile;

    impl FileHandle for PanickingFile {
        fn name(&self) -> &str {
            "panics.csv"
        }

        fn size(&self) -> u64 {
            1
        }

        fn open(&self) -> std::io::Result<Box<dyn std::io::Read + Send>> {
            panic!("reader exploded");
        }
    }

    #[test]
    fn test_run_survives_a_panicking_worker() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let files: Vec<FileRef> = vec![
            Arc::new(PanickingFile) as FileRef,
            MemoryFile::new("after.csv", "a\n1\n").shared(),
        ];

        let state = driver(temp_dir.path()).run(files, None);

        assert!(state.is_idle());
        let failed = state.get("panics.csv").expect("Item should exist");
        assert_eq!(failed.status, Status::ValidationFailed);
        assert_eq!(failed.err.as_deref(), Some("worker panicked: reader exploded"));
        assert_eq!(
            state.get("after.csv").map(|item| item.status),
            Some(Status::UploadSucceeded)
        );
    }

    #[test]
    fn test_completion_events() {
        assert!(is_completion(&Event::upload_succeeded("a")));
        assert!(is_completion(&Event::validation_failed("a", "x")));
        assert!(!is_completion(&Event::progress("a", 0.5)));
        assert!(!is_completion(&Event::remove_file("a")));
    }
}
