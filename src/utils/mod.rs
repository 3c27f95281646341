//! Shared helpers for the binaries.

pub mod bootstrap;
#[cfg(feature = "otel")]
pub mod metrics;
