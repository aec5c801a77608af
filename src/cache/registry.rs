//! Invalidation fan-out across stores.
//!
//! Each item type lives in its own `CacheStore`; mutations name key prefixes
//! without knowing which store holds them. The registry forwards every
//! invalidation to all registered stores and publishes one event per key
//! that was marked stale.

use std::sync::{Arc, RwLock};

use super::events::{EventBus, EventKind};
use super::keys::{KeyPrefix, QueryKey};
use super::lock::{rw_read, rw_write};
use super::store::CacheStore;

const SOURCE: &str = "cache::registry";

/// A store that can mark its entries stale.
pub trait InvalidationTarget: Send + Sync {
    fn target_name(&self) -> &'static str;

    /// Mark matching entries stale and return their keys.
    fn invalidate_prefix(&self, prefix: &KeyPrefix) -> Vec<QueryKey>;
}

impl<T> InvalidationTarget for CacheStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn target_name(&self) -> &'static str {
        self.name()
    }

    fn invalidate_prefix(&self, prefix: &KeyPrefix) -> Vec<QueryKey> {
        self.invalidate(prefix)
    }
}

pub struct CacheRegistry {
    targets: RwLock<Vec<Arc<dyn InvalidationTarget>>>,
    events: Arc<EventBus>,
}

impl CacheRegistry {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            targets: RwLock::new(Vec::new()),
            events,
        }
    }

    pub fn register(&self, target: Arc<dyn InvalidationTarget>) {
        rw_write(&self.targets, SOURCE, "register").push(target);
    }

    pub fn target_names(&self) -> Vec<&'static str> {
        rw_read(&self.targets, SOURCE, "target_names")
            .iter()
            .map(|target| target.target_name())
            .collect()
    }

    /// Invalidate `prefix` in every registered store.
    pub fn invalidate(&self, prefix: &KeyPrefix) -> Vec<QueryKey> {
        let targets = rw_read(&self.targets, SOURCE, "invalidate").clone();
        let mut marked = Vec::new();
        for target in targets {
            marked.extend(target.invalidate_prefix(prefix));
        }
        for key in &marked {
            self.events
                .publish(EventKind::QueryInvalidated { key: key.clone() });
        }
        marked
    }

    /// Invalidate several prefixes, in order.
    pub fn invalidate_all<'a>(
        &self,
        prefixes: impl IntoIterator<Item = &'a KeyPrefix>,
    ) -> Vec<QueryKey> {
        prefixes
            .into_iter()
            .flat_map(|prefix| self.invalidate(prefix))
            .collect()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }
}
