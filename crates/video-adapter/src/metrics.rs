//! Prometheus counters for resolution outcomes.

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

lazy_static! {
    static ref STRATEGY_ATTEMPTS: IntCounterVec = register_int_counter_vec!(
        "vidlens_adapter_strategy_attempts_total",
        "Adapter resolution strategy attempts by strategy and outcome",
        &["strategy", "outcome"]
    )
    .unwrap();
    static ref BINDINGS: IntCounterVec = register_int_counter_vec!(
        "vidlens_adapter_bindings_total",
        "Adapters bound by kind",
        &["kind"]
    )
    .unwrap();
}

pub fn record_attempt(strategy: &str, outcome: &str) {
    STRATEGY_ATTEMPTS.with_label_values(&[strategy, outcome]).inc();
}

pub fn record_binding(kind: &str) {
    BINDINGS.with_label_values(&[kind]).inc();
}
