//! Mock IntentStore implementation for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::intent::DedupKey;
use crate::storage::{IntentRecord, IntentStore, Result, StorageError};

/// Mock intent store that keeps rows in memory.
///
/// Counts every call so tests can assert how often the backend was hit, and
/// can be switched into a failing mode to simulate an outage.
#[derive(Default)]
pub struct MockIntentStore {
    rows: RwLock<HashMap<DedupKey, (i64, NaiveDate)>>,
    next_id: AtomicI64,
    failing: AtomicBool,
    exists_calls: AtomicUsize,
    insert_calls: AtomicUsize,
    touch_calls: AtomicUsize,
}

impl MockIntentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Insert a row directly, bypassing call counters.
    pub async fn seed(&self, key: DedupKey, last_seen: NaiveDate) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.rows.write().await.insert(key, (id, last_seen));
    }

    pub async fn last_seen(&self, key: &DedupKey) -> Option<NaiveDate> {
        self.rows.read().await.get(key).map(|(_, day)| *day)
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn touch_calls(&self) -> usize {
        self.touch_calls.load(Ordering::SeqCst)
    }

    /// Total calls that would have been backend round-trips.
    pub fn backend_calls(&self) -> usize {
        self.exists_calls() + self.insert_calls() + self.touch_calls()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    fn record(key: &DedupKey, id: i64, last_seen: NaiveDate) -> IntentRecord {
        IntentRecord {
            id,
            client_name: key.client_name.clone(),
            client_namespace: key.client_namespace.clone(),
            client_kind: key.client_kind.clone(),
            dns_name: key.dns_name.clone(),
            last_seen,
        }
    }

    fn sorted(mut records: Vec<IntentRecord>) -> Vec<IntentRecord> {
        records.sort_by(|a, b| b.last_seen.cmp(&a.last_seen).then(a.id.cmp(&b.id)));
        records
    }
}

#[async_trait]
impl IntentStore for MockIntentStore {
    async fn init(&self) -> Result<()> {
        self.check()
    }

    async fn exists(&self, key: &DedupKey) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.rows.read().await.contains_key(key))
    }

    async fn insert(&self, key: &DedupKey, last_seen: NaiveDate) -> Result<()> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut rows = self.rows.write().await;
        match rows.get_mut(key) {
            Some((_, day)) => *day = last_seen,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                rows.insert(key.clone(), (id, last_seen));
            }
        }
        Ok(())
    }

    async fn touch(&self, key: &DedupKey, last_seen: NaiveDate) -> Result<u64> {
        self.touch_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        match self.rows.write().await.get_mut(key) {
            Some((_, day)) => {
                *day = last_seen;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_seen_before(&self, cutoff: NaiveDate) -> Result<u64> {
        self.check()?;
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, (_, day)| *day >= cutoff);
        Ok((before - rows.len()) as u64)
    }

    async fn list_all(&self) -> Result<Vec<IntentRecord>> {
        self.check()?;
        let rows = self.rows.read().await;
        Ok(Self::sorted(
            rows.iter()
                .map(|(key, (id, day))| Self::record(key, *id, *day))
                .collect(),
        ))
    }

    async fn list_seen_since(&self, since: NaiveDate) -> Result<Vec<IntentRecord>> {
        self.check()?;
        let rows = self.rows.read().await;
        Ok(Self::sorted(
            rows.iter()
                .filter(|(_, (_, day))| *day >= since)
                .map(|(key, (id, day))| Self::record(key, *id, *day))
                .collect(),
        ))
    }
}
