//! In-memory, time-bounded cache of the current account's running strategies
//!
//! The cache is a holder: it stores one keyed entry and answers freshness
//! questions, but never talks to the service. Every mutation bumps a version
//! counter on a `watch` channel so derived views can be recomputed.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::aggregate::{AggregatedSnapshot, Aggregator};
use crate::types::GridStrategy;

/// The cached strategy list for one account
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Account the data belongs to
    pub account_id: String,
    /// `None` until the first successful fetch; equivalent to a zero timestamp
    pub fetched_at: Option<Instant>,
    pub ttl: Duration,
    /// Active strategies only
    pub data: Vec<GridStrategy>,
}

impl CacheEntry {
    fn empty(account_id: &str, ttl: Duration) -> Self {
        Self {
            account_id: account_id.to_string(),
            fetched_at: None,
            ttl,
            data: Vec::new(),
        }
    }

    /// Younger than the TTL at `now`
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.fetched_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.ttl)
    }
}

/// Freshness bookkeeping exposed to callers
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMeta {
    /// None until an account is connected
    pub account_id: Option<String>,
    /// When the data was last stored or touched
    pub last_fetch_time: Option<Instant>,
    pub ttl: Duration,
    pub debounce: Duration,
}

/// Per-account list of active strategies with a TTL.
///
/// Every write bumps a version on a `watch` channel so views can re-render.
#[derive(Debug)]
pub struct StrategyCache {
    ttl: Duration,
    debounce: Duration,
    entry: Mutex<Option<CacheEntry>>,
    version: watch::Sender<u64>,
}

impl StrategyCache {
    /// Empty cache with no account
    pub fn new(ttl: Duration, debounce: Duration) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            ttl,
            debounce,
            entry: Mutex::new(None),
            version,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CacheEntry>> {
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Current strategy list, in service order
    pub fn get(&self) -> Vec<GridStrategy> {
        self.lock()
            .as_ref()
            .map(|entry| entry.data.clone())
            .unwrap_or_default()
    }

    /// Replace the list for the current account without touching freshness.
    pub fn set(&self, strategies: Vec<GridStrategy>) {
        if let Some(entry) = self.lock().as_mut() {
            entry.data = strategies;
        }
        self.bump();
    }

    /// Write a completed fetch for `account_id` and mark it fresh as of `at`.
    pub fn store(&self, account_id: &str, strategies: Vec<GridStrategy>, at: Instant) {
        {
            let mut guard = self.lock();
            let entry = guard.get_or_insert_with(|| CacheEntry::empty(account_id, self.ttl));
            if entry.account_id != account_id {
                *entry = CacheEntry::empty(account_id, self.ttl);
            }
            entry.data = strategies;
            entry.fetched_at = Some(at);
        }
        self.bump();
    }

    /// Empty the list and reset the TTL clock, keeping the account key.
    pub fn clear(&self) {
        if let Some(entry) = self.lock().as_mut() {
            entry.data.clear();
            entry.fetched_at = None;
        }
        self.bump();
    }

    /// Drop the entry entirely (signed out).
    pub fn forget(&self) {
        *self.lock() = None;
        self.bump();
    }

    /// Start an empty, stale entry for `account_id`.
    pub fn reset_for(&self, account_id: &str) {
        let mut guard = self.lock();
        if let Some(previous) = guard.as_ref() {
            debug!(from = %previous.account_id, to = %account_id, "Account changed, resetting strategy cache");
        }
        *guard = Some(CacheEntry::empty(account_id, self.ttl));
        drop(guard);
        self.bump();
    }

    /// Mark the entry stale so the next refresh fetches, keeping its data.
    pub fn invalidate(&self) {
        if let Some(entry) = self.lock().as_mut() {
            entry.fetched_at = None;
        }
    }

    /// Remove one strategy. Returns whether it was present.
    pub fn remove(&self, session_id: &str) -> bool {
        let removed = match self.lock().as_mut() {
            Some(entry) => {
                let before = entry.data.len();
                entry.data.retain(|s| s.session_id != session_id);
                entry.data.len() != before
            }
            None => false,
        };
        if removed {
            self.bump();
        }
        removed
    }

    /// Move the last-fetch time forward without refetching.
    pub fn touch(&self, at: Instant) {
        if let Some(entry) = self.lock().as_mut() {
            entry.fetched_at = Some(at);
        }
    }

    /// Whether the session is in the cached list
    pub fn contains(&self, session_id: &str) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|entry| entry.data.iter().any(|s| s.session_id == session_id))
    }

    pub fn account_id(&self) -> Option<String> {
        self.lock().as_ref().map(|entry| entry.account_id.clone())
    }

    pub fn is_fresh(&self, now: Instant) -> bool {
        self.lock().as_ref().is_some_and(|entry| entry.is_fresh(now))
    }

    /// Account, last fetch time, TTL and debounce as currently configured
    pub fn meta(&self) -> CacheMeta {
        let guard = self.lock();
        CacheMeta {
            account_id: guard.as_ref().map(|e| e.account_id.clone()),
            last_fetch_time: guard.as_ref().and_then(|e| e.fetched_at),
            ttl: self.ttl,
            debounce: self.debounce,
        }
    }

    /// Rollups over whatever the cache currently holds
    pub fn snapshot(&self) -> AggregatedSnapshot {
        let guard = self.lock();
        let strategies = guard.as_ref().map(|e| e.data.as_slice()).unwrap_or(&[]);
        Aggregator::compute(strategies)
    }

    /// Receiver that changes whenever the cached list does
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StrategyStatus;

    fn strategy(id: &str, ticker: &str) -> GridStrategy {
        GridStrategy {
            session_id: id.to_string(),
            ticker: ticker.to_string(),
            is_running: true,
            status: StrategyStatus {
                is_running: true,
                ..Default::default()
            },
        }
    }

    fn cache() -> StrategyCache {
        StrategyCache::new(Duration::from_secs(30), Duration::from_millis(500))
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_and_freshness() {
        let cache = cache();
        assert!(!cache.is_fresh(Instant::now()));

        cache.store("acct-1", vec![strategy("a", "BTC")], Instant::now());
        assert!(cache.is_fresh(Instant::now()));
        assert_eq!(cache.get().len(), 1);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cache.is_fresh(Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.is_fresh(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_for_new_account_clears() {
        let cache = cache();
        cache.store("acct-1", vec![strategy("a", "BTC")], Instant::now());

        cache.reset_for("acct-2");

        let meta = cache.meta();
        assert_eq!(meta.account_id.as_deref(), Some("acct-2"));
        assert_eq!(meta.last_fetch_time, None);
        assert!(cache.get().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_touch() {
        let cache = cache();
        let start = Instant::now();
        cache.store(
            "acct-1",
            vec![strategy("a", "BTC"), strategy("b", "ETH")],
            start,
        );

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));

        tokio::time::advance(Duration::from_secs(10)).await;
        cache.touch(Instant::now());
        assert_eq!(cache.meta().last_fetch_time, Some(Instant::now()));
    }

    #[tokio::test]
    async fn test_clear_keeps_account_forget_drops_it() {
        let cache = cache();
        cache.store("acct-1", vec![strategy("a", "BTC")], Instant::now());

        cache.clear();
        assert!(cache.get().is_empty());
        assert_eq!(cache.account_id().as_deref(), Some("acct-1"));
        assert!(!cache.is_fresh(Instant::now()));

        cache.forget();
        assert_eq!(cache.account_id(), None);
    }

    #[tokio::test]
    async fn test_invalidate_keeps_data() {
        let cache = cache();
        cache.store("acct-1", vec![strategy("a", "BTC")], Instant::now());
        cache.invalidate();
        assert!(!cache.is_fresh(Instant::now()));
        assert_eq!(cache.get().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let cache = cache();
        let mut rx = cache.subscribe();
        assert!(!rx.has_changed().unwrap());

        cache.store("acct-1", vec![strategy("a", "BTC")], Instant::now());
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        cache.remove("a");
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_contents() {
        let cache = cache();
        assert!(cache.snapshot().is_empty());

        cache.store(
            "acct-1",
            vec![strategy("a", "BTC"), strategy("b", "BTC"), strategy("c", "ETH")],
            Instant::now(),
        );
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.symbol_summaries["BTC"].count, 2);
        assert_eq!(snapshot.symbol_summaries["ETH"].count, 1);
    }
}
