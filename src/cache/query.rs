//! Paginated query engine.
//!
//! Serves cached pages when they are fresh, fetches the first page when a
//! query is absent or stale, and appends following pages on request. Every
//! fetch for a key holds that key's single-flight guard, so appends for one
//! key never interleave.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use super::error::FetchError;
use super::events::{EventBus, EventKind};
use super::inflight::InFlight;
use super::keys::{KeyPrefix, QueryKey};
use super::state::{Cursor, ErrorInfo, Page, QueryState, QueryStatus};
use super::store::{CacheStore, Listener, Subscription};

const METRIC_QUERY_HIT: &str = "palsync_query_hit_total";
const METRIC_QUERY_MISS: &str = "palsync_query_miss_total";
const METRIC_PAGE_FETCH: &str = "palsync_page_fetch_total";
const METRIC_PAGE_FETCH_FAILED: &str = "palsync_page_fetch_failed_total";
const METRIC_PAGE_FETCH_MS: &str = "palsync_page_fetch_ms";

/// Source of pages for one query.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    /// Fetch the page starting at `cursor`; `None` asks for the first page.
    async fn fetch_page(&self, cursor: Option<Cursor>) -> Result<Page<T>, FetchError>;
}

/// Adapts an async closure into a [`PageFetcher`].
pub struct FnFetcher<F>(F);

pub fn fetcher_fn<T, F, Fut>(f: F) -> FnFetcher<F>
where
    F: Fn(Option<Cursor>) -> Fut,
    Fut: Future<Output = Result<Page<T>, FetchError>>,
{
    FnFetcher(f)
}

#[async_trait]
impl<T, F, Fut> PageFetcher<T> for FnFetcher<F>
where
    T: Send + 'static,
    F: Fn(Option<Cursor>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Page<T>, FetchError>> + Send,
{
    async fn fetch_page(&self, cursor: Option<Cursor>) -> Result<Page<T>, FetchError> {
        (self.0)(cursor).await
    }
}

/// Result of asking for the next page.
#[derive(Debug, Clone, PartialEq)]
pub enum NextPage<T> {
    /// The page was fetched; the state reports success or the failure.
    Settled(QueryState<T>),
    /// The cached chain was stale, so the first page was fetched instead.
    Restarted(QueryState<T>),
    /// The last page carries no cursor.
    Exhausted,
    /// A fetch for this key is already running.
    InFlight,
    /// No first page has been loaded yet.
    NotLoaded,
}

impl<T> NextPage<T> {
    /// True when a network call was made.
    pub fn fetched(&self) -> bool {
        matches!(self, Self::Settled(_) | Self::Restarted(_))
    }

    pub fn state(&self) -> Option<&QueryState<T>> {
        match self {
            Self::Settled(state) | Self::Restarted(state) => Some(state),
            _ => None,
        }
    }
}

pub struct QueryEngine<T> {
    store: Arc<CacheStore<T>>,
    in_flight: InFlight<QueryKey>,
    events: Arc<EventBus>,
}

impl<T> QueryEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<CacheStore<T>>, events: Arc<EventBus>) -> Self {
        Self {
            store,
            in_flight: InFlight::new(),
            events,
        }
    }

    pub fn store(&self) -> &Arc<CacheStore<T>> {
        &self.store
    }

    /// Current cached state without fetching.
    pub fn peek(&self, key: &QueryKey) -> Option<QueryState<T>> {
        self.store.get(key)
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn subscribe(&self, key: &QueryKey, listener: Listener<T>) -> Subscription<T> {
        self.store.subscribe(key, listener)
    }

    /// Read a query, fetching its first page when nothing fresh is cached.
    ///
    /// A stale chain is replaced by the new first page. Failures are stored
    /// in the returned state; earlier pages are kept.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn query<F>(&self, key: &QueryKey, fetcher: &F) -> QueryState<T>
    where
        F: PageFetcher<T> + ?Sized,
    {
        if let Some(state) = self.fresh(key) {
            counter!(METRIC_QUERY_HIT).increment(1);
            debug!("Serving cached query");
            return state;
        }

        let Ok(_guard) = self.in_flight.acquire(key) else {
            debug!("Query already loading; returning current state");
            return self.store.get(key).unwrap_or_default();
        };

        // Another task may have finished a fetch between the check and the guard.
        if let Some(state) = self.fresh(key) {
            counter!(METRIC_QUERY_HIT).increment(1);
            return state;
        }
        counter!(METRIC_QUERY_MISS).increment(1);

        let seen_invalidations = self.store.update(key, |state| {
            state.status = QueryStatus::Loading;
            state.invalidations
        });

        match self.fetch(fetcher, None).await {
            Ok(page) => {
                let state = self.store.update(key, |state| {
                    state.pages = vec![page];
                    state.status = QueryStatus::Success;
                    state.error = None;
                    state.updated_at = Some(OffsetDateTime::now_utc());
                    if state.invalidations == seen_invalidations {
                        state.stale = false;
                    }
                    state.clone()
                });
                self.events
                    .publish(EventKind::QueryUpdated { key: key.clone() });
                state
            }
            Err(error) => self.record_failure(key, error, None),
        }
    }

    /// Append the page after the last cached one.
    ///
    /// Does nothing when the chain is exhausted or a fetch for the key is
    /// already running. Retrying after a failure is done by calling this
    /// again.
    #[instrument(skip_all, fields(key = %key))]
    pub async fn fetch_next_page<F>(&self, key: &QueryKey, fetcher: &F) -> NextPage<T>
    where
        F: PageFetcher<T> + ?Sized,
    {
        if self.in_flight.contains(key) {
            return NextPage::InFlight;
        }
        match self.store.get(key) {
            None => return NextPage::NotLoaded,
            Some(state) if state.pages.is_empty() => return NextPage::NotLoaded,
            Some(state) if state.stale => {
                debug!("Cursor chain is stale; restarting from the first page");
                return NextPage::Restarted(self.query(key, fetcher).await);
            }
            Some(_) => {}
        }

        let Ok(_guard) = self.in_flight.acquire(key) else {
            return NextPage::InFlight;
        };

        // Re-read under the guard so the cursor reflects any fetch that just
        // finished.
        let cursor = match self.store.get(key) {
            Some(state) if !state.pages.is_empty() => match state.last_cursor() {
                Some(cursor) => cursor.clone(),
                None => return NextPage::Exhausted,
            },
            _ => return NextPage::NotLoaded,
        };

        self.store.update(key, |state| state.status = QueryStatus::Loading);

        match self.fetch(fetcher, Some(cursor.clone())).await {
            Ok(page) => {
                let state = self.store.update(key, |state| {
                    state.pages.push(page);
                    state.status = QueryStatus::Success;
                    state.error = None;
                    state.updated_at = Some(OffsetDateTime::now_utc());
                    state.clone()
                });
                self.events
                    .publish(EventKind::QueryUpdated { key: key.clone() });
                NextPage::Settled(state)
            }
            Err(error) => NextPage::Settled(self.record_failure(key, error, Some(cursor))),
        }
    }

    /// Mark the query stale and read it again.
    pub async fn refetch<F>(&self, key: &QueryKey, fetcher: &F) -> QueryState<T>
    where
        F: PageFetcher<T> + ?Sized,
    {
        self.store.invalidate(&KeyPrefix::exact(key));
        self.query(key, fetcher).await
    }

    /// Forget the cached state of a query.
    pub fn reset(&self, key: &QueryKey) -> Option<QueryState<T>> {
        self.store.remove(key)
    }

    fn fresh(&self, key: &QueryKey) -> Option<QueryState<T>> {
        self.store.get(key).filter(QueryState::is_fresh)
    }

    async fn fetch<F>(&self, fetcher: &F, cursor: Option<Cursor>) -> Result<Page<T>, FetchError>
    where
        F: PageFetcher<T> + ?Sized,
    {
        let started_at = Instant::now();
        counter!(METRIC_PAGE_FETCH).increment(1);
        let result = fetcher.fetch_page(cursor).await;
        histogram!(METRIC_PAGE_FETCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
        if result.is_err() {
            counter!(METRIC_PAGE_FETCH_FAILED).increment(1);
        }
        result
    }

    fn record_failure(
        &self,
        key: &QueryKey,
        error: FetchError,
        cursor: Option<Cursor>,
    ) -> QueryState<T> {
        warn!(key = %key, cursor = ?cursor, error = %error, "Page fetch failed");
        let message = error.to_string();
        let state = self.store.update(key, |state| {
            state.status = QueryStatus::Error;
            state.error = Some(ErrorInfo::new(error, cursor));
            state.clone()
        });
        self.events.publish(EventKind::QueryFailed {
            key: key.clone(),
            message,
        });
        state
    }
}
