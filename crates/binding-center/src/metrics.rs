//! Prometheus counters for slot transitions.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

lazy_static! {
    static ref RESOLUTION_PASSES: IntCounterVec = register_int_counter_vec!(
        "vidlens_binding_resolution_passes_total",
        "Resolution passes by outcome",
        &["outcome"]
    )
    .unwrap();
    static ref STALE_MARKS: IntCounter = register_int_counter!(
        "vidlens_binding_stale_marks_total",
        "Active bindings marked stale by page changes"
    )
    .unwrap();
    static ref COALESCED_RESCANS: IntCounter = register_int_counter!(
        "vidlens_binding_coalesced_rescans_total",
        "Re-scan requests absorbed into an already running pass"
    )
    .unwrap();
}

pub fn record_pass(outcome: &str) {
    RESOLUTION_PASSES.with_label_values(&[outcome]).inc();
}

pub fn record_stale_mark() {
    STALE_MARKS.inc();
}

pub fn record_coalesced() {
    COALESCED_RESCANS.inc();
}
