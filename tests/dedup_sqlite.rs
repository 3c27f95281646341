//! End-to-end deduplication tests against SQLite.
//!
//! Run with: cargo test --test dedup_sqlite --features sqlite
//!
//! Drives whole batches through classifier, cache, a real SQL store and a
//! recording dispatcher, across simulated days.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use egress_intents::config::{DatabaseConfig, DedupConfig};
use egress_intents::dispatch::{DispatchError, Dispatcher, NotificationPayload};
use egress_intents::storage::{init_storage, IntentStore};
use egress_intents::{ClientIdentity, DedupKey, ExternalTrafficIntent, IntentDeduplicator};

#[derive(Default)]
struct RecordingDispatcher {
    calls: Mutex<Vec<Vec<NotificationPayload>>>,
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, intents: &[NotificationPayload]) -> Result<(), DispatchError> {
        self.calls.lock().unwrap().push(intents.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

impl RecordingDispatcher {
    fn reported(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|p| p.dns_name.clone())
            .collect()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn day(offset: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 9, 30, 0).unwrap() + Duration::days(offset)
}

fn observed(name: &str, dns: &str, ips: &[&str], at: DateTime<Utc>) -> ExternalTrafficIntent {
    ExternalTrafficIntent::new(
        ClientIdentity::new(name, "payments").with_kind("Deployment"),
        dns,
        ips.iter().copied(),
        at,
    )
}

async fn setup(
    config: DedupConfig,
) -> (Arc<dyn IntentStore>, Arc<RecordingDispatcher>, IntentDeduplicator) {
    let store = init_storage(&DatabaseConfig {
        path: ":memory:".to_string(),
        ..Default::default()
    })
    .await
    .expect("in-memory sqlite");
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let dedup = IntentDeduplicator::new(store.clone(), &config).with_dispatcher(dispatcher.clone());
    (store, dispatcher, dedup)
}

#[tokio::test]
async fn test_week_of_traffic_reports_each_relationship_once() {
    let (store, dispatcher, dedup) = setup(DedupConfig::default()).await;

    for offset in 0..7 {
        let at = day(offset);
        let batch = vec![
            observed("checkout", "api.stripe.com", &["52.1.2.3"], at),
            observed("checkout", "api.stripe.com", &["52.1.2.4"], at),
            observed("checkout", "internal.payments.svc", &["10.0.4.2"], at),
            observed("coredns", "upstream.resolver.example", &["1.1.1.1"], at),
        ];
        dedup.process_batch(&batch, at).await;
        assert!(dedup.cache_buckets().await <= 3);
    }

    assert_eq!(dispatcher.reported(), vec!["api.stripe.com"]);
    let rows = store.list_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].last_seen, day(6).date_naive());
}

#[tokio::test]
async fn test_new_relationship_mid_week_is_reported_that_day() {
    let (_, dispatcher, dedup) = setup(DedupConfig::default()).await;

    dedup
        .process_batch(&[observed("checkout", "api.stripe.com", &["52.1.2.3"], day(0))], day(0))
        .await;
    let summary = dedup
        .process_batch(
            &[
                observed("checkout", "api.stripe.com", &["52.1.2.3"], day(3)),
                observed("checkout", "hooks.slack.com", &["34.1.1.1"], day(3)),
            ],
            day(3),
        )
        .await;

    assert_eq!(summary.new_intents.len(), 1);
    assert_eq!(summary.known, 1);
    assert_eq!(dispatcher.reported(), vec!["api.stripe.com", "hooks.slack.com"]);
    assert_eq!(dispatcher.call_count(), 2);
}

#[tokio::test]
async fn test_restart_does_not_rereport_known_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = DatabaseConfig {
        path: dir.path().join("intents.db").to_string_lossy().into_owned(),
        ..Default::default()
    };
    let batch = vec![observed("checkout", "api.stripe.com", &["52.1.2.3"], day(0))];

    {
        let store = init_storage(&db).await.unwrap();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let dedup = IntentDeduplicator::new(store, &DedupConfig::default())
            .with_dispatcher(dispatcher.clone());
        dedup.process_batch(&batch, day(0)).await;
        assert_eq!(dispatcher.call_count(), 1);
    }

    // Fresh process, cold cache, same database.
    let store = init_storage(&db).await.unwrap();
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let dedup =
        IntentDeduplicator::new(store, &DedupConfig::default()).with_dispatcher(dispatcher.clone());
    let summary = dedup.process_batch(&batch, day(0)).await;

    assert_eq!(summary.known, 1);
    assert_eq!(dispatcher.call_count(), 0);
}

#[tokio::test]
async fn test_retention_expires_and_rediscovers() {
    let config = DedupConfig {
        retention_days: 30,
        ..Default::default()
    };
    let (store, dispatcher, dedup) = setup(config).await;
    let key = DedupKey::new("checkout", "payments", "Deployment", "api.stripe.com");

    dedup
        .process_batch(&[observed("checkout", "api.stripe.com", &["52.1.2.3"], day(0))], day(0))
        .await;

    let deleted = dedup.cleanup_expired(day(31)).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(!store.exists(&key).await.unwrap());

    // Long gone from the cache too: seen again, it is new again.
    dedup
        .process_batch(&[observed("checkout", "api.stripe.com", &["52.1.2.3"], day(40))], day(40))
        .await;
    assert_eq!(dispatcher.call_count(), 2);
}

#[tokio::test]
async fn test_list_all_after_cleanup() {
    let config = DedupConfig {
        retention_days: 5,
        ..Default::default()
    };
    let (_, _, dedup) = setup(config).await;

    dedup
        .process_batch(&[observed("checkout", "old.example.com", &["52.1.2.3"], day(0))], day(0))
        .await;
    dedup
        .process_batch(&[observed("checkout", "new.example.com", &["52.1.2.3"], day(8))], day(8))
        .await;

    let records = dedup.list_all(day(8)).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].dns_name, "new.example.com");
    assert_eq!(records[0].client_namespace, "payments");
}

#[tokio::test]
async fn test_warm_cache_from_sqlite() {
    let (store, dispatcher, dedup) = setup(DedupConfig::default()).await;
    let key = DedupKey::new("checkout", "payments", "Deployment", "api.stripe.com");
    store.insert(&key, day(4).date_naive()).await.unwrap();

    assert_eq!(dedup.warm_cache(day(5)).await, 1);
    let summary = dedup
        .process_batch(&[observed("checkout", "api.stripe.com", &["52.1.2.3"], day(5))], day(5))
        .await;

    assert_eq!(summary.known, 1);
    assert_eq!(dispatcher.call_count(), 0);
    assert_eq!(
        store.list_all().await.unwrap()[0].last_seen,
        day(5).date_naive()
    );
}
