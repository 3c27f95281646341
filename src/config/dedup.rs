//! Deduplication configuration.

use std::collections::HashSet;

use serde::Deserialize;

/// Deduplication configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Comma-separated client names whose intents are never recorded.
    pub client_ignore_list: String,
    /// Comma-separated namespaces whose intents are never recorded.
    pub namespace_ignore_list: String,
    /// Days a row may go unseen before it is deleted. Zero or negative
    /// disables retention cleanup.
    pub retention_days: i64,
    /// Seed the cache from rows seen today or yesterday at startup.
    pub warm_cache_on_start: bool,
    /// Upper bound for any single backend call on the per-intent path.
    pub backend_timeout_secs: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            client_ignore_list: "coredns".to_string(),
            namespace_ignore_list: String::new(),
            retention_days: 90,
            warm_cache_on_start: false,
            backend_timeout_secs: 5,
        }
    }
}

impl DedupConfig {
    pub fn ignored_clients(&self) -> HashSet<String> {
        parse_list(&self.client_ignore_list)
    }

    pub fn ignored_namespaces(&self) -> HashSet<String> {
        parse_list(&self.namespace_ignore_list)
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
pub fn parse_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
