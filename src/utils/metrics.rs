//! OTel-native metrics instruments.
//!
//! All instruments are lazily initialized and feature-gated behind `otel`.
//! Naming follows OTel semantic conventions (dot-separated).

use std::sync::LazyLock;

use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::{global, KeyValue};

static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("egress_intents"));

/// Intents processed, labelled by outcome (skipped, known, new, error).
pub static INTENTS_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("egress_intents.intents.total")
        .with_description("Total traffic intents processed")
        .build()
});

/// Dispatch attempts, labelled by outcome (ok, error).
pub static DISPATCH_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("egress_intents.dispatch.total")
        .with_description("Total notification dispatch attempts")
        .build()
});

/// Create an outcome label.
pub fn outcome_attr(outcome: &str) -> KeyValue {
    KeyValue::new("outcome", outcome.to_string())
}
