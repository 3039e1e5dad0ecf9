//! **Usage Quota Tracker** — rolling monthly window over premium-synthesis
//! consumption.
//!
//! The tracker owns one `QuotaRecord` per user/session and is the only writer.
//! Reads tolerate a stale period (a new month is reported as fresh capacity
//! without mutating state); the reset is applied lazily on the next write.
//! Store failures never propagate: the tracker degrades to a conservative
//! estimate so the router can still make a decision.

use crate::error::{SpeechError, SpeechResult};
use chrono::{DateTime, Datelike, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persisted premium-usage record for one monthly period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Start of the current period; the period is keyed on its (year, month).
    pub period_start: DateTime<Utc>,
    /// Premium utterances consumed this period. Monotonically non-decreasing
    /// within a period.
    pub used: u32,
}

impl QuotaRecord {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            period_start: now,
            used: 0,
        }
    }
}

/// Backing store for the quota record. Real deployments persist per identity
/// (ideally with an atomic increment server-side); the in-memory store is the
/// default for single-process use and tests.
pub trait QuotaStore: Send + Sync {
    fn load(&self) -> SpeechResult<Option<QuotaRecord>>;
    fn save(&self, record: &QuotaRecord) -> SpeechResult<()>;
}

/// In-memory quota store.
#[derive(Debug, Default)]
pub struct InMemoryQuotaStore {
    record: Mutex<Option<QuotaRecord>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuotaStore for InMemoryQuotaStore {
    fn load(&self) -> SpeechResult<Option<QuotaRecord>> {
        Ok(self.record.lock().clone())
    }

    fn save(&self, record: &QuotaRecord) -> SpeechResult<()> {
        *self.record.lock() = Some(record.clone());
        Ok(())
    }
}

/// Store that always fails. Exercises the conservative-degrade path in tests.
#[derive(Debug, Default)]
pub struct FailingQuotaStore;

impl QuotaStore for FailingQuotaStore {
    fn load(&self) -> SpeechResult<Option<QuotaRecord>> {
        Err(SpeechError::QuotaStore("store unavailable".to_string()))
    }

    fn save(&self, _record: &QuotaRecord) -> SpeechResult<()> {
        Err(SpeechError::QuotaStore("store unavailable".to_string()))
    }
}

/// Configuration for the quota tracker.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Premium utterances allowed per monthly period (default 100).
    pub monthly_limit: u32,
    /// Assumed consumption when the store cannot be read (default 1), so a
    /// broken store cannot unlock unlimited premium usage.
    pub fallback_used_estimate: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            monthly_limit: 100,
            fallback_used_estimate: 1,
        }
    }
}

/// Tracks premium usage within the current monthly period.
pub struct QuotaTracker {
    config: QuotaConfig,
    store: Arc<dyn QuotaStore>,
    state: Mutex<QuotaRecord>,
}

impl QuotaTracker {
    /// Create a tracker backed by the given store. A failed initial read is
    /// recoverable: the tracker starts from the configured estimate.
    pub fn new(config: QuotaConfig, store: Arc<dyn QuotaStore>) -> Self {
        let now = Utc::now();
        let state = match store.load() {
            Ok(Some(record)) => record,
            Ok(None) => QuotaRecord::fresh(now),
            Err(e) => {
                warn!(
                    "Quota: store read failed ({}), assuming {} used",
                    e, config.fallback_used_estimate
                );
                QuotaRecord {
                    period_start: now,
                    used: config.fallback_used_estimate,
                }
            }
        };
        Self {
            config,
            store,
            state: Mutex::new(state),
        }
    }

    /// Tracker with the default in-memory store.
    pub fn in_memory(config: QuotaConfig) -> Self {
        Self::new(config, Arc::new(InMemoryQuotaStore::new()))
    }

    /// Tracker seeded with an explicit record (period-rollover tests, warm boot).
    pub fn with_record(config: QuotaConfig, store: Arc<dyn QuotaStore>, record: QuotaRecord) -> Self {
        Self {
            config,
            store,
            state: Mutex::new(record),
        }
    }

    fn same_period(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        a.year() == b.year() && a.month() == b.month()
    }

    /// Remaining premium capacity, accounting for period rollover without
    /// mutating state.
    pub fn remaining(&self) -> u32 {
        let state = self.state.lock();
        if !Self::same_period(state.period_start, Utc::now()) {
            return self.config.monthly_limit;
        }
        self.config.monthly_limit.saturating_sub(state.used)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Record `n` units of premium usage, resetting first if the period rolled
    /// over. Store write failures are logged and ignored; the in-memory count
    /// stays authoritative for this process.
    pub fn record_usage(&self, n: u32) {
        let mut state = self.state.lock();
        let now = Utc::now();
        if !Self::same_period(state.period_start, now) {
            debug!("Quota: new period, resetting usage");
            *state = QuotaRecord::fresh(now);
        }
        state.used = state.used.saturating_add(n);
        if let Err(e) = self.store.save(&state) {
            warn!("Quota: store write failed ({}), keeping in-memory count", e);
        }
    }

    /// Units consumed in the current period (0 if the period rolled over).
    pub fn used(&self) -> u32 {
        let state = self.state.lock();
        if !Self::same_period(state.period_start, Utc::now()) {
            return 0;
        }
        state.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn usage_is_monotonic_within_a_period() {
        let tracker = QuotaTracker::in_memory(QuotaConfig {
            monthly_limit: 5,
            ..Default::default()
        });
        let mut last = tracker.remaining();
        for _ in 0..7 {
            tracker.record_usage(1);
            let r = tracker.remaining();
            assert!(r <= last);
            last = r;
        }
        assert_eq!(tracker.remaining(), 0);
        assert!(tracker.is_exhausted());
        assert_eq!(tracker.used(), 7);
    }

    #[test]
    fn stale_period_reads_as_fresh_capacity() {
        let store = Arc::new(InMemoryQuotaStore::new());
        let tracker = QuotaTracker::with_record(
            QuotaConfig {
                monthly_limit: 10,
                ..Default::default()
            },
            store.clone(),
            QuotaRecord {
                period_start: Utc::now() - Duration::days(40),
                used: 9,
            },
        );
        // Read does not mutate: remaining reports a fresh period...
        assert_eq!(tracker.remaining(), 10);
        // ...but the stored record still carries the old period until a write.
        assert_eq!(store.load().unwrap().map(|r| r.used), None);

        tracker.record_usage(1);
        assert_eq!(tracker.remaining(), 9);
        assert_eq!(tracker.used(), 1);
        assert_eq!(store.load().unwrap().map(|r| r.used), Some(1));
    }

    #[test]
    fn store_failure_degrades_conservatively() {
        let tracker = QuotaTracker::new(
            QuotaConfig {
                monthly_limit: 10,
                fallback_used_estimate: 2,
            },
            Arc::new(FailingQuotaStore),
        );
        assert_eq!(tracker.remaining(), 8);
        // Writes keep working against the in-memory count.
        tracker.record_usage(1);
        assert_eq!(tracker.remaining(), 7);
    }

    #[test]
    fn saved_record_round_trips() {
        let store = Arc::new(InMemoryQuotaStore::new());
        let tracker = QuotaTracker::new(QuotaConfig::default(), store.clone());
        tracker.record_usage(3);
        let record = store.load().unwrap().unwrap();
        assert_eq!(record.used, 3);
        let json = serde_json::to_string(&record).unwrap();
        let back: QuotaRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.used, 3);
    }
}
