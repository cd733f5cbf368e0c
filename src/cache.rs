//! In-memory key-value store with per-entry expiry.
//!
//! Backs one-time codes for QR session verification. Entries expire
//! lazily on read; `cleanup_expired` exists for a periodic sweep.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Instant::now() > expires_at,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TtlStore {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl TtlStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let mut store = self.store.write().unwrap();
        store.insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    pub fn get(&self, key: &str) -> Option<String> {
        {
            let store = self.store.read().unwrap();
            match store.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop the entry on the way out.
        let mut store = self.store.write().unwrap();
        if store.get(key).is_some_and(|e| e.is_expired()) {
            store.remove(key);
        }
        None
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        let mut store = self.store.write().unwrap();
        store
            .remove(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value)
    }

    /// Drops all expired entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut store = self.store.write().unwrap();
        let before = store.len();
        store.retain(|_, entry| !entry.is_expired());
        before - store.len()
    }

    pub fn len(&self) -> usize {
        self.store.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn set_and_get() {
        let store = TtlStore::new();
        store.set("code:555", "123456".into(), None);
        assert_eq!(store.get("code:555"), Some("123456".into()));
    }

    #[test]
    fn expired_entries_are_dropped_on_read() {
        let store = TtlStore::new();
        store.set("k", "v".into(), Some(Duration::from_millis(10)));
        sleep(Duration::from_millis(30));
        assert_eq!(store.get("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn remove_consumes_the_entry() {
        let store = TtlStore::new();
        store.set("k", "v".into(), Some(Duration::from_secs(60)));
        assert_eq!(store.remove("k"), Some("v".into()));
        assert_eq!(store.remove("k"), None);
    }

    #[test]
    fn cleanup_reports_removed_count() {
        let store = TtlStore::new();
        store.set("a", "1".into(), Some(Duration::from_millis(5)));
        store.set("b", "2".into(), None);
        sleep(Duration::from_millis(20));
        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
    }
}
