//! Notification dispatch configuration.

use std::time::Duration;

use serde::Deserialize;

/// GitHub `repository_dispatch` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Send one notification per batch with newly discovered intents.
    pub enabled: bool,
    /// API host (`api.github.com`) or base URL with explicit scheme.
    pub url: String,
    pub owner: String,
    pub repo: String,
    /// Bearer token.
    pub token: String,
    /// Suffix of the dispatched event type; the cluster name is prepended.
    pub event_type: String,
    pub timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "api.github.com".to_string(),
            owner: String::new(),
            repo: String::new(),
            token: String::new(),
            event_type: "recieveNewIntents".to_string(),
            timeout_secs: 10,
        }
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full dispatches endpoint. A bare host is assumed to be HTTPS.
    pub fn endpoint(&self) -> String {
        let base = self.url.trim().trim_end_matches('/');
        let base = if base.starts_with("http://") || base.starts_with("https://") {
            base.to_string()
        } else {
            format!("https://{}", base)
        };
        format!("{}/repos/{}/{}/dispatches", base, self.owner, self.repo)
    }

    /// Event type for `cluster`: `<cluster>-<event_type>`.
    pub fn event_type_for(&self, cluster: &str) -> String {
        format!("{}-{}", cluster, self.event_type)
    }
}
