//! Traffic intent types.
//!
//! An intent is one observation of a workload talking to an external DNS
//! name. Intents arrive in batches from an upstream feed; the deduplicator
//! reduces them to [`DedupKey`]s.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the originating workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub name: String,
    pub namespace: String,
    /// Workload owner kind (`Deployment`, `StatefulSet`, ...). May be absent.
    #[serde(default)]
    pub kind: Option<String>,
}

impl ClientIdentity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Owner kind as stored; absent and empty are the same thing.
    pub fn kind_or_empty(&self) -> &str {
        self.kind.as_deref().unwrap_or("")
    }
}

/// One observation of a client resolving and reaching an external name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTrafficIntent {
    pub client: ClientIdentity,
    pub dns_name: String,
    /// IP literals the name resolved to. Not validated on ingest.
    #[serde(default)]
    pub ips: BTreeSet<String>,
    pub observed_at: DateTime<Utc>,
}

impl ExternalTrafficIntent {
    pub fn new(
        client: ClientIdentity,
        dns_name: impl Into<String>,
        ips: impl IntoIterator<Item = impl Into<String>>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            client,
            dns_name: dns_name.into(),
            ips: ips.into_iter().map(Into::into).collect(),
            observed_at,
        }
    }

    /// Calendar day (UTC) the intent was observed on.
    pub fn observed_on(&self) -> NaiveDate {
        self.observed_at.date_naive()
    }

    /// The uniqueness key for this intent.
    pub fn key(&self) -> DedupKey {
        DedupKey::from_intent(self)
    }
}

/// Logical uniqueness key: "this client talks to this external DNS name".
///
/// The cache, the existence query and the insert all go through this type,
/// so every path compares the same four columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey {
    pub client_name: String,
    pub client_namespace: String,
    pub client_kind: String,
    pub dns_name: String,
}

impl DedupKey {
    pub fn new(
        client_name: impl Into<String>,
        client_namespace: impl Into<String>,
        client_kind: impl Into<String>,
        dns_name: impl Into<String>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            client_namespace: client_namespace.into(),
            client_kind: client_kind.into(),
            dns_name: dns_name.into(),
        }
    }

    pub fn from_intent(intent: &ExternalTrafficIntent) -> Self {
        Self::new(
            intent.client.name.as_str(),
            intent.client.namespace.as_str(),
            intent.client.kind_or_empty(),
            intent.dns_name.as_str(),
        )
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{} -> {}",
            self.client_namespace, self.client_kind, self.client_name, self.dns_name
        )
    }
}
