//! Intent deduplication.
//!
//! Reduces batches of observed intents to the relationships that are new,
//! persists them, and notifies the dispatcher once per batch.
//!
//! Three sources of truth are reconciled here:
//! - the rolling in-process cache, which only saves backend reads;
//! - the relational store, whose unique key is authoritative;
//! - the dispatcher, which hears about a relationship at most once.
//!
//! # Novelty protocol
//!
//! For each intent that survives filtering:
//! 1. key in today's bucket: known, no backend call at all;
//! 2. key in yesterday's bucket: known, existence query skipped, but
//!    `last_seen` is still updated;
//! 3. otherwise the backend is asked. Found rows are touched, missing rows
//!    are inserted and reported.
//!
//! Backend errors are per intent. The intent is logged, left out of the
//! cache so the next batch retries it, and never reported.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::cache::{DayWindow, LocalIntentCache};
use crate::classifier::PrivacyClassifier;
use crate::config::DedupConfig;
use crate::dispatch::{Dispatcher, NotificationPayload};
use crate::intent::{DedupKey, ExternalTrafficIntent};
use crate::storage::{IntentRecord, IntentStore, StorageError};

/// How one intent resolved against cache and backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The relationship already existed. Only its recency changed.
    Known,
    /// A new row was written. Reported in this batch's dispatch.
    New,
    /// A backend call failed. Neither cached nor reported.
    Failed,
}

impl StoreOutcome {
    pub fn was_already_known(&self) -> bool {
        matches!(self, Self::Known)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Known => "known",
            Self::New => "new",
            Self::Failed => "error",
        }
    }
}

/// Why an intent never reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoExternalIp,
    IgnoredClient,
    IgnoredNamespace,
}

/// What happened to one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub received: usize,
    pub skipped: usize,
    pub known: usize,
    pub failed: usize,
    /// Relationships first recorded in this batch, in input order.
    pub new_intents: Vec<NotificationPayload>,
    /// Whether the dispatcher accepted the notification.
    pub dispatched: bool,
}

/// Deduplicating front for the intent store.
///
/// Owns the cache and the store handle. Batches are serialized by the
/// cache lock, which is held from the day roll until the last intent of
/// the batch is resolved. Dispatch runs after the lock is released.
pub struct IntentDeduplicator {
    store: Arc<dyn IntentStore>,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    classifier: PrivacyClassifier,
    ignored_clients: HashSet<String>,
    ignored_namespaces: HashSet<String>,
    retention_days: i64,
    backend_timeout: Duration,
    cache: Mutex<LocalIntentCache>,
}

impl IntentDeduplicator {
    pub fn new(store: Arc<dyn IntentStore>, config: &DedupConfig) -> Self {
        Self {
            store,
            dispatcher: None,
            classifier: PrivacyClassifier::new(),
            ignored_clients: config.ignored_clients(),
            ignored_namespaces: config.ignored_namespaces(),
            retention_days: config.retention_days,
            backend_timeout: Duration::from_secs(config.backend_timeout_secs.max(1)),
            cache: Mutex::new(LocalIntentCache::new()),
        }
    }

    /// Enable notification of newly discovered intents.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_classifier(mut self, classifier: PrivacyClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Number of day buckets currently held.
    pub async fn cache_buckets(&self) -> usize {
        self.cache.lock().await.bucket_count()
    }

    /// Filter a batch, resolve novelty for what remains and dispatch the
    /// new relationships once.
    ///
    /// Never fails: per-intent errors are logged and counted in the summary.
    pub async fn process_batch(
        &self,
        intents: &[ExternalTrafficIntent],
        now: DateTime<Utc>,
    ) -> BatchSummary {
        let window = DayWindow::at(now);
        let mut summary = BatchSummary {
            received: intents.len(),
            ..Default::default()
        };

        {
            let mut cache = self.cache.lock().await;
            cache.roll(&window);

            for intent in intents {
                if let Some(reason) = self.skip_reason(intent) {
                    debug!(
                        client_name = %intent.client.name,
                        client_namespace = %intent.client.namespace,
                        dns_name = %intent.dns_name,
                        reason = ?reason,
                        "Skipping intent"
                    );
                    summary.skipped += 1;
                    record_outcome("skipped");
                    continue;
                }

                log_intent(intent, "Received external traffic intent");
                let outcome = self.resolve(&mut cache, intent, &window).await;
                record_outcome(outcome.as_str());
                match outcome {
                    StoreOutcome::Known => summary.known += 1,
                    StoreOutcome::Failed => summary.failed += 1,
                    StoreOutcome::New => {
                        log_new_intent(intent);
                        summary.new_intents.push(NotificationPayload::from(&intent.key()));
                    }
                }
            }
        }

        if !summary.new_intents.is_empty() {
            if let Some(dispatcher) = &self.dispatcher {
                summary.dispatched = self.dispatch(dispatcher.as_ref(), &summary.new_intents).await;
            }
        }

        debug!(
            received = summary.received,
            skipped = summary.skipped,
            known = summary.known,
            new = summary.new_intents.len(),
            failed = summary.failed,
            dispatched = summary.dispatched,
            "Batch processed"
        );
        summary
    }

    /// Resolve one intent against cache and backend.
    ///
    /// `today` and `yesterday` select the cache buckets consulted; the
    /// backend write always uses the intent's own observation day. Buckets
    /// are only evicted by `process_batch`.
    pub async fn store_intent(
        &self,
        intent: &ExternalTrafficIntent,
        today: NaiveDate,
        yesterday: NaiveDate,
    ) -> StoreOutcome {
        let window = DayWindow {
            today,
            yesterday,
            day_before_yesterday: yesterday.pred_opt().unwrap_or(yesterday),
        };
        let mut cache = self.cache.lock().await;
        self.resolve(&mut cache, intent, &window).await
    }

    async fn resolve(
        &self,
        cache: &mut LocalIntentCache,
        intent: &ExternalTrafficIntent,
        window: &DayWindow,
    ) -> StoreOutcome {
        let key = intent.key();
        let observed_on = intent.observed_on();

        if cache.contains(window.today, &key) {
            debug!(key = %key, "Cache hit: today, skipping backend");
            return StoreOutcome::Known;
        }

        let mut known = false;
        if cache.contains(window.yesterday, &key) {
            debug!(key = %key, "Cache hit: yesterday, skipping existence check");
            match self.backend("touch", self.store.touch(&key, observed_on)).await {
                // Row vanished since yesterday: the backend wins, fall through.
                Ok(0) => {}
                Ok(_) => known = true,
                Err(e) => return self.fail(&key, "failed to update intent", e),
            }
        } else {
            // An unreadable existence check is treated as "not found"; the
            // upsert below keeps that from creating a duplicate row.
            let exists = match self.backend("exists", self.store.exists(&key)).await {
                Ok(exists) => exists,
                Err(e) => {
                    error!(key = %key, error = %e, "Failed to query intent existence");
                    false
                }
            };
            if exists {
                match self.backend("touch", self.store.touch(&key, observed_on)).await {
                    Ok(0) => {}
                    Ok(_) => known = true,
                    Err(e) => return self.fail(&key, "failed to update intent", e),
                }
            }
        }

        if known {
            cache.insert(window.today, key);
            return StoreOutcome::Known;
        }

        match self.backend("insert", self.store.insert(&key, observed_on)).await {
            Ok(()) => {
                cache.insert(window.today, key);
                StoreOutcome::New
            }
            Err(e) => self.fail(&key, "failed to insert intent", e),
        }
    }

    fn fail(&self, key: &DedupKey, message: &str, e: StorageError) -> StoreOutcome {
        error!(key = %key, error = %e, "{}", message);
        StoreOutcome::Failed
    }

    /// Run one backend call under the per-operation timeout.
    async fn backend<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, StorageError> {
        tokio::time::timeout(self.backend_timeout, call)
            .await
            .map_err(|_| StorageError::Timeout {
                operation,
                timeout: self.backend_timeout,
            })?
    }

    fn skip_reason(&self, intent: &ExternalTrafficIntent) -> Option<SkipReason> {
        if !self.classifier.has_external_ip(&intent.ips) {
            Some(SkipReason::NoExternalIp)
        } else if self.ignored_clients.contains(intent.client.name.trim()) {
            Some(SkipReason::IgnoredClient)
        } else if self.ignored_namespaces.contains(intent.client.namespace.trim()) {
            Some(SkipReason::IgnoredNamespace)
        } else {
            None
        }
    }

    async fn dispatch(&self, dispatcher: &dyn Dispatcher, intents: &[NotificationPayload]) -> bool {
        match dispatcher.dispatch(intents).await {
            Ok(()) => {
                record_dispatch("ok");
                true
            }
            Err(e) => {
                record_dispatch("error");
                error!(
                    dispatcher = dispatcher.name(),
                    intent_count = intents.len(),
                    error = %e,
                    "Dispatch failed; notification dropped"
                );
                false
            }
        }
    }

    /// Delete rows whose `last_seen` is older than the retention window.
    ///
    /// Returns rows deleted. A non-positive window disables cleanup.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        if self.retention_days <= 0 {
            debug!("Retention cleanup skipped: retention days not configured");
            return Ok(0);
        }

        let cutoff = DayWindow::at(now).days_ago(self.retention_days as u64);
        let deleted = self.store.delete_seen_before(cutoff).await?;
        if deleted > 0 {
            info!(
                rows_deleted = deleted,
                retention_days = self.retention_days,
                cutoff_date = %cutoff,
                "Cleaned up expired external traffic intents"
            );
        }
        Ok(deleted)
    }

    /// Every stored relationship, most recently seen first.
    ///
    /// Runs retention cleanup first; a cleanup failure is logged and the
    /// listing proceeds.
    pub async fn list_all(&self, now: DateTime<Utc>) -> Result<Vec<IntentRecord>, StorageError> {
        if let Err(e) = self.cleanup_expired(now).await {
            warn!(error = %e, "Failed to cleanup expired intents, continuing with query");
        }
        self.store.list_all().await
    }

    /// Seed the cache with rows seen today or yesterday.
    ///
    /// Returns the number of keys loaded. On failure the cache is left as it
    /// was and the error is logged.
    pub async fn warm_cache(&self, now: DateTime<Utc>) -> usize {
        let window = DayWindow::at(now);
        let records = match self.store.list_seen_since(window.yesterday).await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Failed to load cache from database");
                return 0;
            }
        };

        let mut cache = self.cache.lock().await;
        cache.roll(&window);
        let mut loaded = 0;
        for record in records {
            if record.last_seen == window.today || record.last_seen == window.yesterday {
                cache.insert(record.last_seen, record.key());
                loaded += 1;
            }
        }
        info!(loaded, "Warmed intent cache from database");
        loaded
    }
}

fn log_intent(intent: &ExternalTrafficIntent, message: &str) {
    debug!(
        timestamp = %intent.observed_on(),
        client_name = %intent.client.name,
        client_namespace = %intent.client.namespace,
        client_kind = %intent.client.kind_or_empty(),
        dns_name = %intent.dns_name,
        "{}",
        message
    );
}

fn log_new_intent(intent: &ExternalTrafficIntent) {
    info!(
        timestamp = %intent.observed_on(),
        client_name = %intent.client.name,
        client_namespace = %intent.client.namespace,
        client_kind = %intent.client.kind_or_empty(),
        dns_name = %intent.dns_name,
        "Received new intent"
    );
}

#[cfg(feature = "otel")]
fn record_outcome(outcome: &str) {
    use crate::utils::metrics::{self, INTENTS_TOTAL};
    INTENTS_TOTAL.add(1, &[metrics::outcome_attr(outcome)]);
}

#[cfg(not(feature = "otel"))]
fn record_outcome(_outcome: &str) {}

#[cfg(feature = "otel")]
fn record_dispatch(outcome: &str) {
    use crate::utils::metrics::{self, DISPATCH_TOTAL};
    DISPATCH_TOTAL.add(1, &[metrics::outcome_attr(outcome)]);
}

#[cfg(not(feature = "otel"))]
fn record_dispatch(_outcome: &str) {}
