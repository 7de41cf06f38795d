//! Accumulated selections for one wizard session.
//!
//! Each step writes its output under a stable key (`"map"`, `"hero"`, ...). Later steps and the
//! controller read those keys back; nothing else is shared between steps.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionRegistry<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for SelectionRegistry<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> SelectionRegistry<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value);
    }

    /// `None` means the key was never set (or was cleared); an empty value is still `Some`.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove `key`, returning the value it held.
    pub fn clear(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in sorted order, so log lines and snapshots are stable.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
