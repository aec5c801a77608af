//! Palsync cache layer
//!
//! Client-side synchronization core shared by every view:
//!
//! - **Cache store**: one [`CacheStore`] per item type, holding a
//!   [`QueryState`] per [`QueryKey`] with listeners and idle eviction
//! - **Query engine**: cursor-paginated reads through [`QueryEngine`]
//! - **Mutation orchestrator**: single-flight writes with post-success
//!   invalidation through [`MutationOrchestrator`]
//!
//! Stores register with a [`CacheRegistry`] so mutations can invalidate key
//! prefixes without knowing which store holds them. Every state change is
//! published on the [`EventBus`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! idle_entry_limit = 256
//! event_capacity = 256
//! ```

mod config;
mod error;
mod events;
mod inflight;
mod keys;
mod lock;
mod mutation;
mod query;
mod registry;
mod state;
mod store;

pub use config::CacheConfig;
pub use error::{FetchError, MutationError};
pub use events::{CacheEvent, Epoch, EventBus, EventKind};
pub use inflight::{AlreadyInFlight, InFlight, InFlightGuard};
pub use keys::{KeyParam, KeyPrefix, MutationKey, QueryKey, Resource};
pub use mutation::{
    ErrorHook, MutationHandle, MutationOptions, MutationOrchestrator, MutationStatus,
    StepProgress, SuccessHook,
};
pub use query::{FnFetcher, NextPage, PageFetcher, QueryEngine, fetcher_fn};
pub use registry::{CacheRegistry, InvalidationTarget};
pub use state::{Cursor, ErrorInfo, Page, QueryState, QueryStatus};
pub use store::{CacheStore, Listener, Subscription};
