//! The transition function.
//!
//! `transition` applies one event to a snapshot and returns the next
//! snapshot. The input is never modified. Every event that changes item
//! statuses or membership finishes by running the scheduler, which derives
//! `validating` and `uploading` from the new items, so those events hand it
//! both fields unset. Progress updates only touch the targeted item.

use std::sync::Arc;

use tracing::trace;

use crate::event::Event;
use crate::model::{Item, QueueState, Status};
use crate::scheduler::reschedule;

/// Apply `event` to `state`.
///
/// Events naming a file that is not in the queue return an equal state.
pub fn transition(state: &QueueState, event: Event) -> QueueState {
    let kind = event.kind();
    match event {
        Event::AppendFiles { files } => {
            let mut items = state.items.clone();
            for file in files {
                if items.iter().any(|item| item.name() == file.name()) {
                    trace!(file = file.name(), "dropping duplicate file");
                    continue;
                }
                items.push(Arc::new(Item::new(file)));
            }

            reschedule(QueueState {
                items,
                validating: None,
                uploading: None,
            })
        }

        Event::Progress { filename, progress } => {
            if progress.is_nan() {
                trace!(file = %filename, "ignoring NaN progress");
                return state.clone();
            }
            let progress = progress.clamp(0.0, 1.0);
            let Some(items) = replace_item(&state.items, &filename, |item| Item {
                progress,
                ..item.clone()
            }) else {
                return unmatched(state, kind, &filename);
            };

            // Statuses are unchanged, so the derived fields keep their members
            // and only pick up the replaced item.
            let uploading = state.uploading.as_ref().map(|uploading| {
                uploading
                    .iter()
                    .map(|item| {
                        items
                            .iter()
                            .find(|current| current.name() == item.name())
                            .cloned()
                            .unwrap_or_else(|| Arc::clone(item))
                    })
                    .collect()
            });

            QueueState {
                items,
                validating: state.validating.clone(),
                uploading,
            }
        }

        Event::ValidationSucceeded { filename, stats } => {
            let Some(items) = replace_item(&state.items, &filename, |item| Item {
                status: Status::ValidationSucceeded,
                progress: 0.0,
                stats: Some(stats),
                ..item.clone()
            }) else {
                return unmatched(state, kind, &filename);
            };

            reschedule(QueueState {
                items,
                validating: None,
                uploading: None,
            })
        }

        Event::ValidationFailed { filename, err } => {
            let Some(items) = replace_item(&state.items, &filename, |item| Item {
                status: Status::ValidationFailed,
                progress: 0.0,
                err: Some(err),
                ..item.clone()
            }) else {
                return unmatched(state, kind, &filename);
            };

            reschedule(QueueState {
                items,
                validating: None,
                uploading: None,
            })
        }

        Event::UploadSucceeded { filename } => {
            let Some(items) = replace_item(&state.items, &filename, |item| Item {
                status: Status::UploadSucceeded,
                progress: 1.0,
                ..item.clone()
            }) else {
                return unmatched(state, kind, &filename);
            };

            reschedule(QueueState {
                items,
                validating: None,
                uploading: None,
            })
        }

        Event::UploadFailed { filename, err } => {
            let Some(items) = replace_item(&state.items, &filename, |item| Item {
                status: Status::UploadFailed,
                progress: 0.0,
                err: Some(err),
                ..item.clone()
            }) else {
                return unmatched(state, kind, &filename);
            };

            reschedule(QueueState {
                items,
                validating: None,
                uploading: None,
            })
        }

        Event::RemoveFile { filename } => {
            if state.position(&filename).is_none() {
                return unmatched(state, kind, &filename);
            }
            let items = state
                .items
                .iter()
                .filter(|item| item.name() != filename)
                .cloned()
                .collect();

            reschedule(QueueState {
                items,
                validating: None,
                uploading: None,
            })
        }
    }
}

/// Replace the item named `filename` with `update(item)`, sharing the rest.
///
/// Returns `None` if no item has that name.
fn replace_item<F>(items: &[Arc<Item>], filename: &str, update: F) -> Option<Vec<Arc<Item>>>
where
    F: FnOnce(&Item) -> Item,
{
    let index = items.iter().position(|item| item.name() == filename)?;
    let mut next = items.to_vec();
    next[index] = Arc::new(update(&items[index]));
    Some(next)
}

fn unmatched(state: &QueueState, kind: &str, filename: &str) -> QueueState {
    trace!(event = kind, file = filename, "no item with this name");
    state.clone()
}
