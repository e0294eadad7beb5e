//! Flow-scoped key/value storage
//!
//! Storage is the shared mutable state every actor in a flow can reach,
//! regardless of depth. It is created when a run starts, optionally seeded,
//! and cleared when the run ends.
//!
//! # Locking
//!
//! Regular values live in a [`DashMap`], i.e. the key space is partitioned
//! into shards with one lock each: a read and a write of the same key are
//! mutually exclusive, unrelated keys can be accessed concurrently by
//! parallel Branch branches. Named LRU caches sit behind a single mutex.
//! Change listeners are notified after the shard lock has been released.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use regex::{Captures, Regex};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::engine::token::payload_to_string;
use crate::error::{FlowError, FlowResult};

/// Validated storage key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorageName(String);

impl StorageName {
    /// Validate and wrap a storage key
    pub fn new(name: impl Into<String>) -> FlowResult<Self> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(FlowError::InvalidStorageName(name))
        }
    }

    /// Non-empty and made of `[a-zA-Z0-9_-:.]` only
    pub fn is_valid(name: &str) -> bool {
        !name.is_empty() && name.chars().all(is_storage_char)
    }

    /// Turn an arbitrary string into a valid name by replacing invalid characters with `_`
    pub fn sanitize(name: &str) -> FlowResult<Self> {
        let cleaned: String = name
            .chars()
            .map(|c| if is_storage_char(c) { c } else { '_' })
            .collect();
        Self::new(cleaned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_storage_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}

impl fmt::Display for StorageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kind of storage modification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageChangeType {
    Added,
    Modified,
    Removed,
}

/// Notification sent to storage change listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChangeEvent {
    pub change: StorageChangeType,
    pub name: String,
    /// Cache the change happened in, `None` for regular storage
    pub cache: Option<String>,
}

/// Observer of storage modifications
pub trait StorageChangeListener: Send + Sync {
    fn storage_changed(&self, event: &StorageChangeEvent);
}

/// Fixed-capacity least-recently-used cache
#[derive(Clone)]
struct LruCache {
    capacity: usize,
    entries: HashMap<String, JsonValue>,
    order: VecDeque<String>,
}

impl LruCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn put(&mut self, key: String, value: JsonValue) {
        if self.entries.insert(key.clone(), value).is_some() {
            self.touch(&key);
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
    }

    fn get(&mut self, key: &str) -> Option<JsonValue> {
        let value = self.entries.get(key).cloned();
        if value.is_some() {
            self.touch(key);
        }
        value
    }

    fn remove(&mut self, key: &str) -> Option<JsonValue> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.order.retain(|k| k != key);
        }
        removed
    }
}

struct StorageInner {
    data: DashMap<String, JsonValue>,
    caches: Mutex<HashMap<String, LruCache>>,
    listeners: RwLock<Vec<Arc<dyn StorageChangeListener>>>,
}

/// Shared storage for one flow run. Clones share the same data.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<StorageInner>,
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage {
    /// Create empty storage
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StorageInner {
                data: DashMap::new(),
                caches: Mutex::new(HashMap::new()),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Create storage seeded with initial values
    pub fn from_values(values: HashMap<String, JsonValue>) -> FlowResult<Self> {
        let storage = Self::new();
        for (name, value) in values {
            storage.set(&StorageName::new(name)?, value);
        }
        Ok(storage)
    }

    /// Store a value, overwriting any previous one (last writer wins)
    pub fn set(&self, name: &StorageName, value: JsonValue) -> Option<JsonValue> {
        let previous = self.inner.data.insert(name.0.clone(), value);
        let change = if previous.is_some() {
            StorageChangeType::Modified
        } else {
            StorageChangeType::Added
        };
        self.notify(change, name.as_str(), None);
        previous
    }

    /// Read a value; an absent key is `None` and must be handled by the caller
    pub fn get(&self, name: &StorageName) -> Option<JsonValue> {
        self.inner.data.get(name.as_str()).map(|v| v.value().clone())
    }

    /// Atomically read-modify-write one key while holding its lock.
    ///
    /// The closure receives the current value (if any) and returns the new one.
    pub fn update<F>(&self, name: &StorageName, f: F) -> FlowResult<JsonValue>
    where
        F: FnOnce(Option<&JsonValue>) -> FlowResult<JsonValue>,
    {
        let (value, existed) = match self.inner.data.entry(name.0.clone()) {
            Entry::Occupied(mut entry) => {
                let updated = f(Some(entry.get()))?;
                entry.insert(updated.clone());
                (updated, true)
            }
            Entry::Vacant(entry) => {
                let updated = f(None)?;
                entry.insert(updated.clone());
                (updated, false)
            }
        };
        let change = if existed {
            StorageChangeType::Modified
        } else {
            StorageChangeType::Added
        };
        self.notify(change, name.as_str(), None);
        Ok(value)
    }

    pub fn has(&self, name: &StorageName) -> bool {
        self.inner.data.contains_key(name.as_str())
    }

    /// Remove a value, returning it if it was present
    pub fn remove(&self, name: &StorageName) -> Option<JsonValue> {
        let removed = self.inner.data.remove(name.as_str()).map(|(_, v)| v);
        if removed.is_some() {
            self.notify(StorageChangeType::Removed, name.as_str(), None);
        }
        removed
    }

    /// Remove every key matching the regular expression, returns the number removed
    pub fn remove_matching(&self, pattern: &str) -> FlowResult<usize> {
        let regex = Regex::new(pattern)?;
        let keys: Vec<String> = self
            .inner
            .data
            .iter()
            .filter(|entry| regex.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        let mut removed = 0;
        for key in keys {
            if self.inner.data.remove(&key).is_some() {
                removed += 1;
                self.notify(StorageChangeType::Removed, &key, None);
            }
        }
        Ok(removed)
    }

    /// Sorted list of keys in regular storage
    pub fn keys(&self) -> Vec<StorageName> {
        let mut keys: Vec<StorageName> = self
            .inner
            .data
            .iter()
            .map(|entry| StorageName(entry.key().clone()))
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    /// Copy of all regular values
    pub fn snapshot(&self) -> HashMap<String, JsonValue> {
        self.inner
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Independent copy of the values and caches. Listeners are not copied.
    pub fn detached_copy(&self) -> Self {
        let copy = Self::new();
        for entry in self.inner.data.iter() {
            copy.inner.data.insert(entry.key().clone(), entry.value().clone());
        }
        *copy.inner.caches.lock() = self.inner.caches.lock().clone();
        copy
    }

    /// Remove all values and caches. Listeners stay registered.
    pub fn clear(&self) {
        self.inner.data.clear();
        self.inner.caches.lock().clear();
    }

    // =========================================================================
    // LRU caches
    // =========================================================================

    /// Create (or replace) a named LRU cache
    pub fn add_cache(&self, cache: impl Into<String>, capacity: usize) {
        self.inner
            .caches
            .lock()
            .insert(cache.into(), LruCache::new(capacity));
    }

    /// Sorted cache names
    pub fn caches(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.caches.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Store a value in a cache; returns false if the cache does not exist
    pub fn set_in_cache(&self, cache: &str, name: &StorageName, value: JsonValue) -> bool {
        let stored = match self.inner.caches.lock().get_mut(cache) {
            Some(lru) => {
                lru.put(name.0.clone(), value);
                true
            }
            None => false,
        };
        if stored {
            self.notify(StorageChangeType::Added, name.as_str(), Some(cache));
        }
        stored
    }

    pub fn get_from_cache(&self, cache: &str, name: &StorageName) -> Option<JsonValue> {
        self.inner
            .caches
            .lock()
            .get_mut(cache)
            .and_then(|lru| lru.get(name.as_str()))
    }

    pub fn remove_from_cache(&self, cache: &str, name: &StorageName) -> Option<JsonValue> {
        let removed = self
            .inner
            .caches
            .lock()
            .get_mut(cache)
            .and_then(|lru| lru.remove(name.as_str()));
        if removed.is_some() {
            self.notify(StorageChangeType::Removed, name.as_str(), Some(cache));
        }
        removed
    }

    pub fn cache_len(&self, cache: &str) -> usize {
        self.inner
            .caches
            .lock()
            .get(cache)
            .map(|lru| lru.entries.len())
            .unwrap_or(0)
    }

    // =========================================================================
    // Expansion and listeners
    // =========================================================================

    /// Replace `%{name}` with the textual form of the stored value.
    ///
    /// Placeholders for absent keys are left untouched.
    pub fn expand(&self, text: &str) -> String {
        static STORAGE_PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        if !text.contains("%{") {
            return text.to_string();
        }
        let regex = STORAGE_PLACEHOLDER
            .get_or_init(|| Regex::new(r"%\{([^}]+)\}").expect("storage placeholder pattern is a valid regex"));
        regex
            .replace_all(text, |caps: &Captures| {
                let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                match self.inner.data.get(key) {
                    Some(value) => payload_to_string(value.value()),
                    None => caps
                        .get(0)
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default(),
                }
            })
            .into_owned()
    }

    pub fn add_change_listener(&self, listener: Arc<dyn StorageChangeListener>) {
        self.inner.listeners.write().push(listener);
    }

    fn notify(&self, change: StorageChangeType, name: &str, cache: Option<&str>) {
        let listeners = self.inner.listeners.read();
        if listeners.is_empty() {
            return;
        }
        let event = StorageChangeEvent {
            change,
            name: name.to_string(),
            cache: cache.map(str::to_string),
        };
        for listener in listeners.iter() {
            listener.storage_changed(&event);
        }
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("keys", &self.keys())
            .field("caches", &self.caches())
            .finish()
    }
}
