//! End-to-end event sequences, auditing invariants after every step.

use std::sync::Arc;

use queue::{
    reset, schedule, transition, Event, FileRef, FileStats, Item, MemoryFile, QueueState, Status,
    MAX_CONCURRENT_UPLOADS,
};

fn file(name: &str) -> FileRef {
    MemoryFile::new(name, name).shared()
}

fn stats(name: &str) -> FileStats {
    FileStats {
        hash: format!("hash-{}", name),
        row_count: 10,
        columns: vec!["id".to_string()],
    }
}

/// Apply events in order, checking invariants and scheduler idempotence.
fn run(mut state: QueueState, events: Vec<Event>) -> QueueState {
    for event in events {
        let label = format!("{} {:?}", event.kind(), event.filename());
        state = transition(&state, event);
        if let Err(violation) = state.check_invariants() {
            panic!("after {}: {}", label, violation);
        }
        assert!(state.count(Status::Validating) <= 1);
        assert!(state.count(Status::Uploading) <= MAX_CONCURRENT_UPLOADS);
        assert_eq!(schedule(&state), state, "scheduler not idempotent after {}", label);
    }
    state
}

#[test]
fn empty_queue() {
    let state = reset();
    assert!(state.items.is_empty());
    assert!(state.validating.is_none());
    assert!(state.uploading.is_none());
}

#[test]
fn validation_pipeline_for_single_file() {
    let state = run(reset(), vec![Event::append_files([file("f1")])]);
    assert_eq!(state.items.len(), 1);
    assert_eq!(state.items[0].status, Status::Validating);
    assert_eq!(state.validating_name(), Some("f1"));

    let state = run(state, vec![Event::validation_succeeded("f1", stats("f1"))]);
    let item = &state.items[0];
    assert_eq!(item.status, Status::Uploading);
    assert_eq!(item.progress, 0.0);
    assert_eq!(item.stats, Some(stats("f1")));
    assert!(state.validating.is_none());
    assert_eq!(state.uploading.as_ref().map(Vec::len), Some(1));
}

#[test]
fn upload_cap_holds_back_fourth_file_in_order() {
    let items: Vec<Arc<Item>> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| Arc::new(Item::new(file(name)).with_status(Status::ValidationSucceeded)))
        .collect();
    let state = schedule(&QueueState {
        items,
        ..QueueState::default()
    });

    assert_eq!(state.uploading_names(), vec!["a", "b", "c"]);
    assert_eq!(state.items[3].status, Status::ValidationSucceeded);
}

#[test]
fn append_dedup_in_any_status() {
    for status in [
        Status::Waiting,
        Status::ValidationFailed,
        Status::Uploading,
        Status::UploadSucceeded,
    ] {
        let existing = Arc::new(Item::new(file("file1.txt")).with_status(status));
        let state = schedule(&QueueState {
            items: vec![existing],
            ..QueueState::default()
        });
        let state = transition(&state, Event::append_files([file("file1.txt")]));
        assert_eq!(state.items.len(), 1, "status {}", status);
    }
}

#[test]
fn removal_mid_upload_fills_freed_slot() {
    let state = run(
        reset(),
        vec![
            Event::append_files([file("a"), file("b"), file("c"), file("d")]),
            Event::validation_succeeded("a", stats("a")),
            Event::validation_succeeded("b", stats("b")),
            Event::validation_succeeded("c", stats("c")),
            Event::validation_succeeded("d", stats("d")),
        ],
    );
    assert_eq!(state.uploading_names(), vec!["a", "b", "c"]);
    assert_eq!(state.items[3].status, Status::ValidationSucceeded);

    let state = run(state, vec![Event::remove_file("b")]);
    assert_eq!(state.uploading_names(), vec!["a", "c", "d"]);
}

#[test]
fn progress_never_schedules() {
    let state = run(reset(), vec![Event::append_files([file("a"), file("b")])]);
    let after = transition(&state, Event::progress("b", 0.4));

    assert_eq!(after.items[1].status, Status::Waiting);
    assert_eq!(after.items[1].progress, 0.4);
    assert_eq!(after.validating_name(), state.validating_name());
    assert_eq!(after.uploading_names(), state.uploading_names());
}

#[test]
fn mixed_session_drains_to_idle() {
    let names = ["a.csv", "b.csv", "c.csv", "d.csv", "e.csv"];
    let mut state = run(
        reset(),
        vec![Event::append_files(names.iter().map(|name| file(name)))],
    );

    // Drive the queue the way a driver would: answer whatever holds a slot.
    let mut steps = 0;
    while !state.is_idle() {
        steps += 1;
        assert!(steps < 100, "queue did not drain");

        let mut events = Vec::new();
        if let Some(name) = state.validating_name() {
            if name == "c.csv" {
                events.push(Event::validation_failed(name, "invalid csv format"));
            } else {
                events.push(Event::progress(name, 0.5));
                events.push(Event::validation_succeeded(name, stats(name)));
            }
        }
        for name in state.uploading_names() {
            if name == "e.csv" {
                events.push(Event::upload_failed(name, "connection reset"));
            } else {
                events.push(Event::upload_succeeded(name));
            }
        }
        state = run(state, events);
    }

    let statuses: Vec<Status> = state.items.iter().map(|item| item.status).collect();
    assert_eq!(
        statuses,
        vec![
            Status::UploadSucceeded,
            Status::UploadSucceeded,
            Status::ValidationFailed,
            Status::UploadSucceeded,
            Status::UploadFailed,
        ]
    );
    assert_eq!(state.items[2].err.as_deref(), Some("invalid csv format"));
    assert!(state.validating.is_none());
    assert!(state.uploading.is_none());
}
