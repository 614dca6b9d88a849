// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process session store with TTL expiry.
//!
//! Used when no `REDIS_URL` is configured and throughout the test suite.
//! Expired entries are dropped when read and swept on every write.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::store::{SessionStore, SessionStoreError, SessionStoreResult};

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Session store backed by a mutex-guarded map.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SessionStoreResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| SessionStoreError::Unavailable("session map poisoned".to_string()))
    }

    /// Remaining lifetime of a live entry.
    #[cfg(test)]
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let entries = self.lock().ok()?;
        let now = Instant::now();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Entries held in the map, live or not yet swept.
    #[cfg(test)]
    fn stored(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }
}

fn expiry(now: Instant, ttl: Duration) -> SessionStoreResult<Instant> {
    now.checked_add(ttl)
        .ok_or_else(|| SessionStoreError::Protocol(format!("ttl {ttl:?} out of range")))
}

fn sweep(entries: &mut HashMap<String, Entry>, now: Instant) {
    entries.retain(|_, entry| entry.is_live(now));
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> SessionStoreResult<()> {
        let now = Instant::now();
        let expires_at = expiry(now, ttl)?;
        let mut entries = self.lock()?;
        sweep(&mut entries, now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> SessionStoreResult<bool> {
        let now = Instant::now();
        let expires_at = expiry(now, ttl)?;
        let mut entries = self.lock()?;
        sweep(&mut entries, now);
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> SessionStoreResult<Option<String>> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        let live = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());
        if live.is_none() {
            // Expired or missing - drop any stale entry
            entries.remove(key);
        }
        Ok(live)
    }

    async fn exists(&self, key: &str) -> SessionStoreResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> SessionStoreResult<bool> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        Ok(entries.remove(key).is_some_and(|entry| entry.is_live(now)))
    }

    async fn delete_if_eq(&self, key: &str, expected: &str) -> SessionStoreResult<bool> {
        let mut entries = self.lock()?;
        let now = Instant::now();
        let matches = entries
            .get(key)
            .is_some_and(|entry| entry.is_live(now) && entry.value == expected);
        if matches {
            entries.remove(key);
        }
        Ok(matches)
    }

    async fn flush_all(&self) -> SessionStoreResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn ping(&self) -> SessionStoreResult<()> {
        self.lock().map(|_| ())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn set_get_exists_delete() {
        let store = InMemorySessionStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());

        store.set("k", "token-1", HOUR).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("token-1"));
        assert!(store.exists("k").await.unwrap());

        store.set("k", "token-2", HOUR).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("token-2"));

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn set_if_absent_refuses_live_entries() {
        let store = InMemorySessionStore::new();
        assert!(store.set_if_absent("k", "first", HOUR).await.unwrap());
        assert!(!store.set_if_absent("k", "second", HOUR).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn entries_expire_passively() {
        let store = InMemorySessionStore::new();
        store
            .set("k", "token", Duration::from_millis(5))
            .await
            .unwrap();
        assert!(store.ttl_remaining("k").is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!store.exists("k").await.unwrap());
        assert!(store.ttl_remaining("k").is_none());
        // An expired key no longer blocks a conditional write.
        assert!(store.set_if_absent("k", "fresh", HOUR).await.unwrap());
    }

    #[tokio::test]
    async fn flush_all_clears_every_session() {
        let store = InMemorySessionStore::new();
        store.set("a", "1", HOUR).await.unwrap();
        store.set("b", "2", HOUR).await.unwrap();
        assert_eq!(store.stored(), 2);

        store.flush_all().await.unwrap();
        assert_eq!(store.stored(), 0);
    }

    #[tokio::test]
    async fn delete_if_eq_only_removes_matching_value() {
        let store = InMemorySessionStore::new();
        store.set("k", "current", HOUR).await.unwrap();

        assert!(!store.delete_if_eq("k", "stale").await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("current"));

        assert!(store.delete_if_eq("k", "current").await.unwrap());
        assert!(!store.exists("k").await.unwrap());
        assert!(!store.delete_if_eq("missing", "current").await.unwrap());
    }

    #[tokio::test]
    async fn writes_sweep_expired_entries() {
        let store = InMemorySessionStore::new();
        for key in ["a", "b", "c"] {
            store
                .set(key, "token", Duration::from_millis(5))
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        // None of the expired keys is read again.
        assert!(store.set_if_absent("d", "token", HOUR).await.unwrap());
        assert_eq!(store.stored(), 1);
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_an_error() {
        let store = InMemorySessionStore::new();
        let result = store.set("k", "token", Duration::MAX).await;
        assert!(matches!(result, Err(SessionStoreError::Protocol(_))));
        assert!(store.set_if_absent("k", "token", Duration::MAX).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_conditional_writes_admit_one_winner() {
        let store = std::sync::Arc::new(InMemorySessionStore::new());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_if_absent("same-identity", &format!("token-{i}"), HOUR)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
