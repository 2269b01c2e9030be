//! In-memory configuration source.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

use super::{ChangeToken, ConfigurationSource};

/// A configuration source backed by an in-memory map.
///
/// Mutations that actually change an entry fire every outstanding watch
/// token. Useful as the programmatic source behind an
/// [`OptionsMonitor`](crate::OptionsMonitor) and as the test double for
/// anything consuming [`ConfigurationSource`].
pub struct MemorySource {
    entries: RwLock<HashMap<String, String>>,
    watchers: Mutex<Vec<ChangeToken>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Create a source pre-populated from an iterator of key/value pairs.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source = Self::new();
        {
            let mut map = source.entries.write();
            for (key, value) in entries {
                map.insert(key.into(), value.into());
            }
        }
        source
    }

    /// Insert or replace a value, firing watchers when the entry changed.
    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        let value = value.into();
        let changed = {
            let mut entries = self.entries.write();
            match entries.get(&key) {
                Some(existing) if *existing == value => false,
                _ => {
                    entries.insert(key, value);
                    true
                }
            }
        };
        if changed {
            self.notify_watchers();
        }
    }

    /// Remove a key, firing watchers when it was present.
    pub fn remove(&self, key: &str) {
        let changed = self.entries.write().remove(key).is_some();
        if changed {
            self.notify_watchers();
        }
    }

    fn notify_watchers(&self) {
        // Tokens are single-fire, so the registry is drained. Firing happens
        // outside the lock: a callback may immediately call watch() again.
        let tokens = std::mem::take(&mut *self.watchers.lock());
        for token in tokens {
            token.fire();
        }
    }
}

impl ConfigurationSource for MemorySource {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn watch(&self) -> ChangeToken {
        let token = ChangeToken::new();
        self.watchers.lock().push(token.clone());
        token
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}
