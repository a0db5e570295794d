// SPDX-FileCopyrightText: 2026 smsgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concurrent key/value map with optional per-entry expiry.
//!
//! Backs every transient in-memory table in smsgate: the push coalescing
//! table, the push blacklist and the device token cache. All operations
//! take a short synchronous lock and never await while holding it, so the
//! map is safe to call from async code without blocking the runtime.
//!
//! Expired entries are invisible to readers immediately and are physically
//! removed either lazily (on access) or by [`ExpiringMap::cleanup`].

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A concurrent map whose entries may expire.
///
/// `ttl` set at construction is the default lifetime of every entry;
/// `None` means entries live until removed.
pub struct ExpiringMap<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    ttl: Option<Duration>,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash,
{
    /// Map whose entries never expire on their own.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Map whose entries expire `ttl` after they were last set.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        // A panic while holding the lock cannot leave the map half-updated:
        // every critical section is a single HashMap call.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deadline(&self, ttl: Option<Duration>) -> Option<Instant> {
        ttl.map(|ttl| Instant::now() + ttl)
    }

    /// Inserts or overwrites `key` with the map's default TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.ttl);
    }

    /// Inserts or overwrites `key` with an explicit TTL (`None` = no expiry).
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) {
        let expires_at = self.deadline(ttl);
        self.lock().insert(key, Entry { value, expires_at });
    }

    /// Inserts `key` only if it is absent or expired. Returns whether the value was stored.
    pub fn set_if_absent(&self, key: K, value: V) -> bool {
        let now = Instant::now();
        let expires_at = self.deadline(self.ttl);
        let mut entries = self.lock();
        match entries.get(&key) {
            Some(existing) if !existing.is_expired(now) => false,
            _ => {
                entries.insert(key, Entry { value, expires_at });
                true
            }
        }
    }

    /// Returns whether a live entry exists for `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Removes `key` and returns its value if it was live.
    pub fn take<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.lock()
            .remove(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value)
    }

    /// Removes `key`. Returns whether a live entry was removed.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.take(key).is_some()
    }

    /// Atomically empties the map and returns every live entry.
    ///
    /// Inserts racing with the drain land either in the returned snapshot
    /// or in the fresh, empty table; none are lost.
    pub fn drain(&self) -> HashMap<K, V> {
        let now = Instant::now();
        let snapshot = std::mem::take(&mut *self.lock());
        snapshot
            .into_iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| (key, entry.value))
            .collect()
    }

    /// Physically removes expired entries. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet cleaned up.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Returns a clone of the live value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    /// Runs [`ExpiringMap::cleanup`] every `interval` until `cancel` fires.
    pub async fn run_cleanup(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.cleanup();
                    if removed > 0 {
                        debug!(removed, "expired cache entries removed");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    }
}

impl<K, V> Default for ExpiringMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let map = ExpiringMap::with_ttl(Duration::from_secs(10));
        map.set("a", 1);
        assert_eq!(map.get(&"a"), Some(1));

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(map.contains(&"a"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(map.get(&"a"), None);
        assert!(!map.contains(&"a"));
    }

    #[tokio::test(start_paused = true)]
    async fn set_overwrites_and_refreshes_expiry() {
        let map = ExpiringMap::with_ttl(Duration::from_secs(10));
        map.set("a", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        map.set("a", 2);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(map.get(&"a"), Some(2));
    }

    #[test]
    fn set_if_absent_keeps_existing_value() {
        let map = ExpiringMap::new();
        assert!(map.set_if_absent("a", 1));
        assert!(!map.set_if_absent("a", 2));
        assert_eq!(map.get(&"a"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_replaces_expired_value() {
        let map = ExpiringMap::with_ttl(Duration::from_secs(1));
        map.set("a", 1);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(map.set_if_absent("a", 2));
        assert_eq!(map.get(&"a"), Some(2));
    }

    #[test]
    fn take_removes_entry() {
        let map = ExpiringMap::new();
        map.set("a", 1);
        assert_eq!(map.take(&"a"), Some(1));
        assert_eq!(map.take(&"a"), None);
        assert!(map.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_returns_live_entries_and_empties_map() {
        let map = ExpiringMap::new();
        map.set("live", 1);
        map.set_with_ttl("short", 2, Some(Duration::from_secs(1)));
        tokio::time::advance(Duration::from_secs(2)).await;

        let drained = map.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained.get("live"), Some(&1));
        assert!(map.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cleanup_counts_removed_entries() {
        let map = ExpiringMap::with_ttl(Duration::from_secs(1));
        map.set("a", 1);
        map.set("b", 2);
        map.set_with_ttl("c", 3, None);
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(map.len(), 3);
        assert_eq!(map.cleanup(), 2);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn owned_keys_are_looked_up_by_borrowed_form() {
        let map: ExpiringMap<String, u32> = ExpiringMap::new();
        map.set("push-a".to_string(), 7);

        assert!(map.contains("push-a"));
        assert_eq!(map.get("push-a"), Some(7));
        assert!(!map.contains("push-b"));
        assert_eq!(map.take("push-a"), Some(7));
        assert!(!map.remove("push-a"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_survive_drains() {
        let map = Arc::new(ExpiringMap::new());
        let mut producers = Vec::new();
        for p in 0..4 {
            let map = map.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..250 {
                    map.set(format!("{p}-{i}"), i);
                    tokio::task::yield_now().await;
                }
            }));
        }

        let mut seen = 0;
        while producers.iter().any(|h| !h.is_finished()) {
            seen += map.drain().len();
            tokio::task::yield_now().await;
        }
        for handle in producers {
            handle.await.unwrap();
        }
        seen += map.drain().len();

        assert_eq!(seen, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn run_cleanup_stops_on_cancel() {
        let map = Arc::new(ExpiringMap::<&str, i32>::with_ttl(Duration::from_secs(1)));
        map.set("a", 1);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(map.clone().run_cleanup(Duration::from_secs(5), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(map.is_empty());

        cancel.cancel();
        task.await.unwrap();
    }
}
