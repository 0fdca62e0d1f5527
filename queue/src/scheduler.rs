//! Slot scheduling.
//!
//! Validation is a single slot: one file is validated at a time, in selection
//! order. Uploads share a pool of [`MAX_CONCURRENT_UPLOADS`] slots, filled
//! from validated files in queue order. After any structural change the
//! scheduler fills free slots and re-derives `validating` and `uploading`
//! from item statuses, so the derived fields can never drift from `items`.

use std::sync::Arc;

use tracing::debug;

use crate::model::{QueueState, Status, MAX_CONCURRENT_UPLOADS};

/// Fill free slots and recompute the derived fields of `state`.
///
/// Idempotent: scheduling an already scheduled state returns an equal state.
pub fn schedule(state: &QueueState) -> QueueState {
    reschedule(state.clone())
}

pub(crate) fn reschedule(mut state: QueueState) -> QueueState {
    if state.items.is_empty() {
        state.validating = None;
        state.uploading = None;
        return state;
    }

    let mut validating = state
        .items
        .iter()
        .position(|item| item.status == Status::Validating);

    if validating.is_none() {
        if let Some(index) = state
            .items
            .iter()
            .position(|item| item.status == Status::Waiting)
        {
            let promoted = state.items[index].with_status(Status::Validating);
            debug!(file = promoted.name(), "promoted to validating");
            state.items[index] = Arc::new(promoted);
            validating = Some(index);
        }
    }

    state.validating = validating.map(|index| Arc::clone(&state.items[index].file));

    let in_flight = state.count(Status::Uploading);
    let free = MAX_CONCURRENT_UPLOADS.saturating_sub(in_flight);
    if free > 0 {
        let ready: Vec<usize> = state
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status == Status::ValidationSucceeded)
            .map(|(index, _)| index)
            .take(free)
            .collect();

        for index in ready {
            let promoted = state.items[index].with_status(Status::Uploading);
            debug!(file = promoted.name(), in_flight, "promoted to uploading");
            state.items[index] = Arc::new(promoted);
        }
    }

    let uploading: Vec<_> = state
        .items
        .iter()
        .filter(|item| item.status == Status::Uploading)
        .cloned()
        .collect();
    state.uploading = if uploading.is_empty() {
        None
    } else {
        Some(uploading)
    };

    state
}
