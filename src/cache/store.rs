//! Query result storage.
//!
//! One `CacheStore` holds every `QueryState` for an item type. Entries with
//! subscribers stay resident; entries without subscribers are tracked in an
//! LRU and dropped once more than `idle_entry_limit` of them accumulate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use lru::LruCache;
use metrics::counter;
use tracing::debug;

use super::config::CacheConfig;
use super::keys::{KeyPrefix, QueryKey};
use super::lock::{mutex_lock, rw_read, rw_write};
use super::state::QueryState;

const SOURCE: &str = "cache::store";
const METRIC_INVALIDATED_KEYS: &str = "palsync_invalidated_keys_total";
const METRIC_EVICTED: &str = "palsync_cache_evict_total";

/// Called synchronously after every write to the subscribed key.
pub type Listener<T> = Arc<dyn Fn(&QueryKey, &QueryState<T>) + Send + Sync>;

type ListenerId = u64;

struct Entry<T> {
    state: Option<QueryState<T>>,
    listeners: Vec<(ListenerId, Listener<T>)>,
}

impl<T> Entry<T> {
    fn empty() -> Self {
        Self {
            state: None,
            listeners: Vec::new(),
        }
    }
}

pub struct CacheStore<T> {
    name: &'static str,
    entries: RwLock<HashMap<QueryKey, Entry<T>>>,
    idle: Mutex<LruCache<QueryKey, ()>>,
    next_listener: AtomicU64,
}

impl<T> CacheStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a store; `name` labels it in logs.
    pub fn new(name: &'static str, config: &CacheConfig) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
            idle: Mutex::new(LruCache::new(config.idle_entry_limit_non_zero())),
            next_listener: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, key: &QueryKey) -> Option<QueryState<T>> {
        rw_read(&self.entries, SOURCE, "get")
            .get(key)
            .and_then(|entry| entry.state.clone())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        rw_read(&self.entries, SOURCE, "contains")
            .get(key)
            .is_some_and(|entry| entry.state.is_some())
    }

    /// Replace the state of `key` and notify its listeners.
    pub fn set(&self, key: &QueryKey, state: QueryState<T>) {
        self.update(key, move |current| *current = state);
    }

    /// Modify the state of `key` in place (starting from idle when absent)
    /// and notify its listeners once with the result.
    pub fn update<R>(&self, key: &QueryKey, f: impl FnOnce(&mut QueryState<T>) -> R) -> R {
        let (output, snapshot, listeners) = {
            let mut entries = rw_write(&self.entries, SOURCE, "update");
            let entry = entries.entry(key.clone()).or_insert_with(Entry::empty);
            let state = entry.state.get_or_insert_with(QueryState::idle);
            let output = f(state);
            let snapshot = state.clone();
            let listeners: Vec<Listener<T>> = entry
                .listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            if listeners.is_empty() {
                self.touch_idle(&mut entries, key);
            }
            (output, snapshot, listeners)
        };

        for listener in listeners {
            listener(key, &snapshot);
        }
        output
    }

    /// Mark every cached state matching `prefix` as stale.
    ///
    /// Pages are kept so readers keep showing the last good data until the
    /// refetch lands. Returns the keys that were marked.
    pub fn invalidate(&self, prefix: &KeyPrefix) -> Vec<QueryKey> {
        let mut marked = Vec::new();
        let mut entries = rw_write(&self.entries, SOURCE, "invalidate");
        for (key, entry) in entries.iter_mut() {
            let Some(state) = entry.state.as_mut() else {
                continue;
            };
            if prefix.matches(key) {
                state.stale = true;
                state.invalidations += 1;
                marked.push(key.clone());
            }
        }
        drop(entries);

        if !marked.is_empty() {
            counter!(METRIC_INVALIDATED_KEYS).increment(marked.len() as u64);
            debug!(
                store = self.name,
                prefix = %prefix,
                count = marked.len(),
                "Marked cached queries stale"
            );
        }
        marked
    }

    /// Register `listener` for writes to `key`.
    ///
    /// The key stays resident while the returned subscription is alive.
    pub fn subscribe(self: &Arc<Self>, key: &QueryKey, listener: Listener<T>) -> Subscription<T> {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        {
            let mut entries = rw_write(&self.entries, SOURCE, "subscribe");
            entries
                .entry(key.clone())
                .or_insert_with(Entry::empty)
                .listeners
                .push((id, listener));
            mutex_lock(&self.idle, SOURCE, "subscribe.idle").pop(key);
        }
        Subscription {
            store: Arc::downgrade(self),
            key: key.clone(),
            id,
        }
    }

    fn unsubscribe(&self, key: &QueryKey, id: ListenerId) {
        let mut entries = rw_write(&self.entries, SOURCE, "unsubscribe");
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        entry.listeners.retain(|(listener_id, _)| *listener_id != id);
        if !entry.listeners.is_empty() {
            return;
        }
        if entry.state.is_none() {
            entries.remove(key);
        } else {
            self.touch_idle(&mut entries, key);
        }
    }

    pub fn listener_count(&self, key: &QueryKey) -> usize {
        rw_read(&self.entries, SOURCE, "listener_count")
            .get(key)
            .map_or(0, |entry| entry.listeners.len())
    }

    /// Drop the cached state of `key`; listeners stay registered.
    pub fn remove(&self, key: &QueryKey) -> Option<QueryState<T>> {
        let mut entries = rw_write(&self.entries, SOURCE, "remove");
        mutex_lock(&self.idle, SOURCE, "remove.idle").pop(key);
        let entry = entries.get_mut(key)?;
        let state = entry.state.take();
        if entry.listeners.is_empty() {
            entries.remove(key);
        }
        state
    }

    /// Drop every cached state; listeners stay registered.
    pub fn clear(&self) {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        entries.retain(|_, entry| {
            entry.state = None;
            !entry.listeners.is_empty()
        });
        mutex_lock(&self.idle, SOURCE, "clear.idle").clear();
    }

    /// Number of keys holding a cached state.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len")
            .values()
            .filter(|entry| entry.state.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record `key` as recently used while unsubscribed, evicting the
    /// oldest idle entry when the idle set is full.
    fn touch_idle(&self, entries: &mut HashMap<QueryKey, Entry<T>>, key: &QueryKey) {
        let evicted = mutex_lock(&self.idle, SOURCE, "touch_idle").push(key.clone(), ());
        let Some((evicted_key, ())) = evicted else {
            return;
        };
        if &evicted_key == key {
            return;
        }
        let unsubscribed = entries
            .get(&evicted_key)
            .is_some_and(|entry| entry.listeners.is_empty());
        if unsubscribed {
            entries.remove(&evicted_key);
            counter!(METRIC_EVICTED).increment(1);
            debug!(store = self.name, key = %evicted_key, "Evicted idle query");
        }
    }
}

/// Keeps a listener registered; dropping it unsubscribes.
pub struct Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    store: Weak<CacheStore<T>>,
    key: QueryKey,
    id: ListenerId,
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl<T> Drop for Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(&self.key, self.id);
        }
    }
}
