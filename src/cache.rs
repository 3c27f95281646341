//! Rolling day-bucketed intent cache.
//!
//! Holds the [`DedupKey`]s seen today and yesterday. Rolling to a new day
//! drops every older bucket, so memory stays bounded by two days of
//! distinct keys no matter how much traffic arrives.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::intent::DedupKey;

/// Largest number of buckets that may exist at any time.
pub const MAX_BUCKETS: usize = 3;

/// Day boundaries for one processing cycle, all in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub today: NaiveDate,
    pub yesterday: NaiveDate,
    pub day_before_yesterday: NaiveDate,
}

impl DayWindow {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self::for_day(now.date_naive())
    }

    pub fn for_day(today: NaiveDate) -> Self {
        let yesterday = today.pred_opt().unwrap_or(today);
        let day_before_yesterday = yesterday.pred_opt().unwrap_or(yesterday);
        Self {
            today,
            yesterday,
            day_before_yesterday,
        }
    }

    /// `today` minus `days`, saturating at the earliest representable date.
    pub fn days_ago(&self, days: u64) -> NaiveDate {
        self.today
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDate::MIN)
    }
}

#[derive(Debug, Default)]
pub struct LocalIntentCache {
    buckets: HashMap<NaiveDate, HashSet<DedupKey>>,
}

impl LocalIntentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to `window`: evict every bucket outside `[yesterday, today]`
    /// and make sure a `today` bucket exists.
    ///
    /// Buckets dated after `today` are dropped too, so a clock stepping
    /// backwards cannot leave stale future buckets behind.
    pub fn roll(&mut self, window: &DayWindow) {
        let before = self.buckets.len();
        self.buckets
            .retain(|day, _| *day >= window.yesterday && *day <= window.today);
        let evicted = before - self.buckets.len();
        if evicted > 0 {
            tracing::debug!(evicted, today = %window.today, "Evicted expired cache buckets");
        }
        self.buckets.entry(window.today).or_default();
    }

    pub fn contains(&self, day: NaiveDate, key: &DedupKey) -> bool {
        self.buckets
            .get(&day)
            .is_some_and(|bucket| bucket.contains(key))
    }

    /// Record `key` as seen on `day`. Returns false if it was already there.
    pub fn insert(&mut self, day: NaiveDate, key: DedupKey) -> bool {
        self.buckets.entry(day).or_default().insert(key)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total keys across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
