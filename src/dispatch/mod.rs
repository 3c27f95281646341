//! Notification dispatch.
//!
//! After a batch has been persisted, the intents discovered in it are sent
//! to an external automation endpoint in a single call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::intent::DedupKey;

pub mod github;

pub use github::GithubDispatcher;

/// Errors that can occur when dispatching a notification.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// HTTP request failed (connect, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The endpoint answered with something other than success.
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

/// One newly discovered relationship, as reported externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub client_name: String,
    pub client_namespace: String,
    pub client_kind: String,
    pub dns_name: String,
}

impl From<&DedupKey> for NotificationPayload {
    fn from(key: &DedupKey) -> Self {
        Self {
            client_name: key.client_name.clone(),
            client_namespace: key.client_namespace.clone(),
            client_kind: key.client_kind.clone(),
            dns_name: key.dns_name.clone(),
        }
    }
}

/// Destination for per-batch notifications.
///
/// Implementations make exactly one attempt; a failed notification is
/// reported to the caller and not retried.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver all newly discovered intents of one batch.
    async fn dispatch(&self, intents: &[NotificationPayload]) -> Result<(), DispatchError>;

    /// Return the dispatcher name for logging/metrics.
    fn name(&self) -> &str;
}
