//! Bridge metrics
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

use crate::domain::effects::Status;
use metrics::{counter, describe_counter, describe_gauge, gauge};

pub fn describe_metrics() {
    describe_gauge!("modemlink_live_calls", "Number of call contexts currently allocated");
    describe_gauge!("modemlink_live_bearers", "Number of bearer contexts currently allocated");
    describe_counter!(
        "modemlink_completions_total",
        "Total number of client tokens resolved, by status"
    );
    describe_counter!(
        "modemlink_expired_tokens_total",
        "Total number of parked tokens failed after the pending timeout"
    );
    describe_counter!(
        "modemlink_dropped_events_total",
        "Total number of baseband events that matched no context"
    );
}

pub fn update_live_contexts(calls: usize, bearers: usize) {
    gauge!("modemlink_live_calls").set(calls as f64);
    gauge!("modemlink_live_bearers").set(bearers as f64);
}

pub fn record_completion(status: Status) {
    let status = match status {
        Status::Success => "success",
        Status::GenericFailure => "generic_failure",
    };
    counter!("modemlink_completions_total", "status" => status).increment(1);
}

pub fn record_expired(count: usize) {
    if count > 0 {
        counter!("modemlink_expired_tokens_total").increment(count as u64);
    }
}

pub fn record_dropped_event(event: &'static str, kind: &'static str) {
    counter!("modemlink_dropped_events_total", "event" => event, "error" => kind).increment(1);
}
