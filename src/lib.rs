//! egress-intents - external traffic intent recorder
//!
//! Records which workloads talk to which external DNS names. Batches of
//! observed intents are filtered, deduplicated against a rolling day cache
//! and a relational store, and newly discovered relationships are reported
//! to a GitHub `repository_dispatch` endpoint.
//!
//! ```text
//! intents --> [classifier] --> [cache] --> [IntentStore] --> new? --> [Dispatcher]
//! ```

pub mod cache;
pub mod classifier;
pub mod config;
pub mod dedup;
pub mod dispatch;
pub mod intent;
pub mod storage;
pub mod utils;

pub use dedup::{BatchSummary, IntentDeduplicator, StoreOutcome};
pub use intent::{ClientIdentity, DedupKey, ExternalTrafficIntent};
