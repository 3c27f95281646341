//! Shared storage integration tests.
//!
//! Tests the IntentStore interface against every SQL backend. Each backend
//! test binary imports these test functions and runs them.

pub mod intent_store_tests;
