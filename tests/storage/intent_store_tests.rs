//! IntentStore interface tests.
//!
//! These tests verify the contract of the IntentStore trait.
//! Each storage implementation should run these tests against one shared
//! store, so every test uses its own DNS names and date range.

use chrono::NaiveDate;
use egress_intents::storage::IntentStore;
use egress_intents::DedupKey;

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn key(dns: &str) -> DedupKey {
    DedupKey::new("test-client", "test-ns", "Deployment", dns)
}

async fn last_seen<S: IntentStore>(store: &S, key: &DedupKey) -> Option<NaiveDate> {
    store
        .list_all()
        .await
        .expect("list_all should succeed")
        .into_iter()
        .find(|r| r.key() == *key)
        .map(|r| r.last_seen)
}

// =============================================================================
// IntentStore::init tests
// =============================================================================

pub async fn test_init_is_idempotent<S: IntentStore>(store: &S) {
    store.init().await.expect("second init should succeed");
}

// =============================================================================
// IntentStore::exists / insert tests
// =============================================================================

pub async fn test_exists_missing<S: IntentStore>(store: &S) {
    let found = store
        .exists(&key("missing.contract.test"))
        .await
        .expect("exists should succeed");
    assert!(!found, "missing key should not exist");
}

pub async fn test_insert_then_exists<S: IntentStore>(store: &S) {
    let k = key("insert.contract.test");
    store
        .insert(&k, day(2026, 3, 1))
        .await
        .expect("insert should succeed");

    assert!(store.exists(&k).await.unwrap(), "inserted key should exist");
    assert_eq!(last_seen(store, &k).await, Some(day(2026, 3, 1)));
}

pub async fn test_insert_is_upsert<S: IntentStore>(store: &S) {
    let k = key("upsert.contract.test");
    store.insert(&k, day(2026, 3, 1)).await.unwrap();
    store
        .insert(&k, day(2026, 3, 5))
        .await
        .expect("duplicate insert should not fail");

    let rows: Vec<_> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.key() == k)
        .collect();
    assert_eq!(rows.len(), 1, "unique key must hold a single row");
    assert_eq!(rows[0].last_seen, day(2026, 3, 5));
}

pub async fn test_every_key_column_counts<S: IntentStore>(store: &S) {
    let base = key("columns.contract.test");
    store.insert(&base, day(2026, 3, 1)).await.unwrap();

    let other_kind = DedupKey::new("test-client", "test-ns", "CronJob", "columns.contract.test");
    let other_ns = DedupKey::new("test-client", "other-ns", "Deployment", "columns.contract.test");
    let other_name = DedupKey::new("other-client", "test-ns", "Deployment", "columns.contract.test");

    for k in [&other_kind, &other_ns, &other_name] {
        assert!(!store.exists(k).await.unwrap(), "{} should not match", k);
    }
}

pub async fn test_empty_kind<S: IntentStore>(store: &S) {
    let k = DedupKey::new("test-client", "test-ns", "", "nokind.contract.test");
    store.insert(&k, day(2026, 3, 1)).await.unwrap();
    assert!(store.exists(&k).await.unwrap(), "empty kind is a valid key");
}

// =============================================================================
// IntentStore::touch tests
// =============================================================================

pub async fn test_touch_updates_last_seen<S: IntentStore>(store: &S) {
    let k = key("touch.contract.test");
    store.insert(&k, day(2026, 3, 1)).await.unwrap();

    let affected = store
        .touch(&k, day(2026, 3, 9))
        .await
        .expect("touch should succeed");

    assert_eq!(affected, 1);
    assert_eq!(last_seen(store, &k).await, Some(day(2026, 3, 9)));
}

pub async fn test_touch_missing_affects_nothing<S: IntentStore>(store: &S) {
    let affected = store
        .touch(&key("touch-missing.contract.test"), day(2026, 3, 9))
        .await
        .expect("touch should succeed");
    assert_eq!(affected, 0);
}

// =============================================================================
// Retention and listing tests
// =============================================================================

pub async fn test_delete_seen_before<S: IntentStore>(store: &S) {
    let old = key("delete-old.contract.test");
    let boundary = key("delete-boundary.contract.test");
    store.insert(&old, day(2001, 1, 1)).await.unwrap();
    store.insert(&boundary, day(2001, 6, 1)).await.unwrap();

    let deleted = store
        .delete_seen_before(day(2001, 6, 1))
        .await
        .expect("delete should succeed");

    assert_eq!(deleted, 1, "only rows strictly before the cutoff go");
    assert!(!store.exists(&old).await.unwrap());
    assert!(store.exists(&boundary).await.unwrap());

    store.delete_seen_before(day(2001, 6, 2)).await.unwrap();
}

pub async fn test_list_all_orders_most_recent_first<S: IntentStore>(store: &S) {
    let earlier = key("order-earlier.contract.test");
    let later = key("order-later.contract.test");
    store.insert(&earlier, day(2050, 1, 1)).await.unwrap();
    store.insert(&later, day(2050, 1, 3)).await.unwrap();

    let all = store.list_all().await.unwrap();
    let pos = |k: &DedupKey| all.iter().position(|r| r.key() == *k).unwrap();
    assert!(pos(&later) < pos(&earlier));
    assert!(all.windows(2).all(|w| w[0].last_seen >= w[1].last_seen));
}

pub async fn test_list_seen_since<S: IntentStore>(store: &S) {
    store
        .insert(&key("since-before.contract.test"), day(2098, 12, 31))
        .await
        .unwrap();
    store
        .insert(&key("since-on.contract.test"), day(2099, 1, 1))
        .await
        .unwrap();
    store
        .insert(&key("since-after.contract.test"), day(2099, 1, 2))
        .await
        .unwrap();

    let recent = store
        .list_seen_since(day(2099, 1, 1))
        .await
        .expect("list_seen_since should succeed");

    let names: Vec<_> = recent.iter().map(|r| r.dns_name.as_str()).collect();
    assert_eq!(
        names,
        vec!["since-after.contract.test", "since-on.contract.test"]
    );
}

/// Run all IntentStore tests against a store.
#[macro_export]
macro_rules! run_intent_store_tests {
    ($store:expr) => {
        use $crate::storage::intent_store_tests::*;

        test_init_is_idempotent($store).await;
        println!("  test_init_is_idempotent: PASSED");

        // exists / insert
        test_exists_missing($store).await;
        println!("  test_exists_missing: PASSED");

        test_insert_then_exists($store).await;
        println!("  test_insert_then_exists: PASSED");

        test_insert_is_upsert($store).await;
        println!("  test_insert_is_upsert: PASSED");

        test_every_key_column_counts($store).await;
        println!("  test_every_key_column_counts: PASSED");

        test_empty_kind($store).await;
        println!("  test_empty_kind: PASSED");

        // touch
        test_touch_updates_last_seen($store).await;
        println!("  test_touch_updates_last_seen: PASSED");

        test_touch_missing_affects_nothing($store).await;
        println!("  test_touch_missing_affects_nothing: PASSED");

        // retention and listing
        test_delete_seen_before($store).await;
        println!("  test_delete_seen_before: PASSED");

        test_list_all_orders_most_recent_first($store).await;
        println!("  test_list_all_orders_most_recent_first: PASSED");

        test_list_seen_since($store).await;
        println!("  test_list_seen_since: PASSED");
    };
}
