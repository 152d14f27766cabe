use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::{Clock, PersistentStore, StoreError, SystemClock, Ttl};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-process store. Expiry is evaluated lazily on read against the
/// injected [`Clock`].
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        match self.entries.lock() {
            Ok(entries) => entries
                .values()
                .filter(|e| e.expires_at.is_none_or(|exp| exp > now))
                .count(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("memory store lock poisoned on read of {key}: {e}");
                return None;
            }
        };
        let expired = entries.get(key)?.expires_at.is_some_and(|exp| exp <= now);
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: &str, ttl: Ttl) -> Result<(), StoreError> {
        let expires_at = ttl.expires_at(self.clock.now());
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| std::io::Error::other(format!("memory store lock poisoned: {e}")))?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| std::io::Error::other(format!("memory store lock poisoned: {e}")))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;

    /// Clock that only moves when told to.
    pub(crate) struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        pub(crate) fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn get_missing_key_is_absent() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope"), None);
    }

    #[test]
    fn set_get_delete() {
        let store = MemoryStore::new();
        store.set("k", "v", Ttl::Days(7)).unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));

        store.delete("k").unwrap();
        assert_eq!(store.get("k"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn entries_expire_independently() {
        let clock = ManualClock::new();
        let store = MemoryStore::with_clock(clock.clone());

        store.set("short", "a", Ttl::Days(1)).unwrap();
        store.set("long", "b", Ttl::Days(7)).unwrap();
        store.set("forever", "c", Ttl::Indefinite).unwrap();

        clock.advance(Duration::days(2));
        assert_eq!(store.get("short"), None);
        assert_eq!(store.get("long").as_deref(), Some("b"));

        clock.advance(Duration::days(6));
        assert_eq!(store.get("long"), None);
        assert_eq!(store.get("forever").as_deref(), Some("c"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rewrite_extends_expiry() {
        let clock = ManualClock::new();
        let store = MemoryStore::with_clock(clock.clone());

        store.set("k", "1", Ttl::Days(7)).unwrap();
        clock.advance(Duration::days(6));
        store.set("k", "2", Ttl::Days(7)).unwrap();
        clock.advance(Duration::days(6));
        assert_eq!(store.get("k").as_deref(), Some("2"));
    }
}
