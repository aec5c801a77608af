//! Cache configuration.
//!
//! Controls how many unsubscribed entries stay resident and how many events
//! the notification channel buffers.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_IDLE_ENTRY_LIMIT: usize = 256;
const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries without subscribers kept before the least recently touched
    /// one is evicted.
    pub idle_entry_limit: usize,
    /// Buffered events per notification subscriber before it lags.
    pub event_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            idle_entry_limit: DEFAULT_IDLE_ENTRY_LIMIT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            idle_entry_limit: settings.idle_entry_limit.get(),
            event_capacity: settings.event_capacity.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the idle entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn idle_entry_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.idle_entry_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the event capacity, clamping to 1 if zero.
    pub fn event_capacity_clamped(&self) -> usize {
        self.event_capacity.max(1)
    }
}
