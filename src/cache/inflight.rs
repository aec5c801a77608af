//! Single-flight tracking.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("operation already in flight for `{key}`")]
pub struct AlreadyInFlight {
    pub key: String,
}

/// Set of keys with an operation currently running.
///
/// `acquire` hands out a guard that releases the key when dropped, so a key
/// is freed even when the owning future is dropped mid-await.
pub struct InFlight<K: Eq + Hash> {
    keys: Arc<DashMap<K, ()>>,
}

impl<K> InFlight<K>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    pub fn new() -> Self {
        Self {
            keys: Arc::new(DashMap::new()),
        }
    }

    pub fn acquire(&self, key: &K) -> Result<InFlightGuard<K>, AlreadyInFlight> {
        match self.keys.entry(key.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Ok(InFlightGuard {
                    key: key.clone(),
                    keys: Arc::clone(&self.keys),
                })
            }
            Entry::Occupied(_) => Err(AlreadyInFlight {
                key: key.to_string(),
            }),
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.keys.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<K> Default for InFlight<K>
where
    K: Eq + Hash + Clone + fmt::Display,
{
    fn default() -> Self {
        Self::new()
    }
}

pub struct InFlightGuard<K: Eq + Hash> {
    key: K,
    keys: Arc<DashMap<K, ()>>,
}

impl<K: Eq + Hash> Drop for InFlightGuard<K> {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}
