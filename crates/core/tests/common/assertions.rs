//! Assertions over run states and event streams.

#![allow(dead_code)]

use ledit_protocol::{Event, RunState, StepStatus};
use tokio::sync::mpsc;

pub fn status_of(state: &RunState, step_id: &str) -> StepStatus {
    state
        .step(step_id)
        .unwrap_or_else(|| panic!("no step '{step_id}' in run state"))
        .status
}

pub fn assert_step_status(state: &RunState, step_id: &str, expected: StepStatus) {
    assert_eq!(
        status_of(state, step_id),
        expected,
        "step '{step_id}' has the wrong status"
    );
}

/// Every step reached completed, failed or skipped.
pub fn assert_all_terminal(state: &RunState) {
    for record in &state.steps {
        assert!(
            record.status.is_terminal(),
            "step '{}' is still {:?}",
            record.step_id,
            record.status
        );
    }
}

/// `first` ended no later than `second` started.
pub fn finished_before(state: &RunState, first: &str, second: &str) -> bool {
    let ended = state.step(first).and_then(|r| r.ended_at);
    let started = state.step(second).and_then(|r| r.started_at);
    match (ended, started) {
        (Some(ended), Some(started)) => ended <= started,
        _ => false,
    }
}

/// The running windows of the two steps intersect.
pub fn overlapping(state: &RunState, a: &str, b: &str) -> bool {
    let window = |id: &str| {
        let record = state.step(id)?;
        Some((record.started_at?, record.ended_at?))
    };
    match (window(a), window(b)) {
        (Some((a_start, a_end)), Some((b_start, b_end))) => a_start < b_end && b_start < a_end,
        _ => false,
    }
}

/// Everything buffered in the channel right now.
pub fn drain_events(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// `ProcessStarted` first, a terminal process event last.
pub fn assert_event_sequence(events: &[Event]) {
    let first = events.first().expect("event sequence is empty");
    assert!(
        matches!(first, Event::ProcessStarted { .. }),
        "first event should be ProcessStarted, got: {first:?}"
    );
    let last = events.last().expect("event sequence is empty");
    assert!(
        matches!(
            last,
            Event::ProcessCompleted { .. }
                | Event::ProcessFailed { .. }
                | Event::ProcessCancelled { .. }
        ),
        "last event should end the process, got: {last:?}"
    );
}

/// Statuses reported for one step, in order.
pub fn step_statuses(events: &[Event], step_id: &str) -> Vec<StepStatus> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::StepStatusUpdate {
                step_id: id,
                status,
                ..
            } if id == step_id => Some(*status),
            _ => None,
        })
        .collect()
}
