use metrics::{counter, describe_counter, describe_histogram, histogram};

pub const STORE_OPERATIONS: &str = "contentdbx_store_operations_total";
pub const STORE_OPERATION_DURATION: &str = "contentdbx_store_operation_duration_seconds";
pub const EVENTS_APPENDED: &str = "contentdbx_events_appended_total";
pub const EVENTS_FORKED: &str = "contentdbx_events_forked_total";
pub const PROJECTION_EVENTS_APPLIED: &str = "contentdbx_projection_events_applied_total";
pub const PROJECTION_REBUILDS: &str = "contentdbx_projection_rebuilds_total";

/// Registers metric descriptions with whatever recorder the embedding
/// process installed. Safe to call more than once.
pub fn describe() {
    describe_counter!(
        STORE_OPERATIONS,
        "Total number of operations executed against the event log."
    );
    describe_histogram!(
        STORE_OPERATION_DURATION,
        "Latency of operations executed against the event log."
    );
    describe_counter!(
        EVENTS_APPENDED,
        "Total number of events appended across all content streams."
    );
    describe_counter!(
        EVENTS_FORKED,
        "Total number of events copied into a new content stream by a fork."
    );
    describe_counter!(
        PROJECTION_EVENTS_APPLIED,
        "Total number of events folded into the node aggregate projection."
    );
    describe_counter!(
        PROJECTION_REBUILDS,
        "Total number of projection rebuilds, by outcome."
    );
}

pub fn record_store_op(op: &'static str, outcome: &'static str, seconds: f64) {
    counter!(STORE_OPERATIONS, "op" => op, "outcome" => outcome).increment(1);
    histogram!(STORE_OPERATION_DURATION, "op" => op).record(seconds);
}
