//! Query and page state held by the cache store.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::error::FetchError;

/// Opaque token naming the boundary of the next page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Items returned by one fetch plus the cursor of the following page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<Cursor>) -> Self {
        Self { items, next_cursor }
    }

    /// A page with no successor.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Failure surfaced to readers of a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub message: String,
    /// Cursor of the page whose fetch failed; `None` for the first page.
    pub cursor: Option<Cursor>,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    #[serde(skip)]
    pub error: FetchError,
}

impl ErrorInfo {
    pub fn new(error: FetchError, cursor: Option<Cursor>) -> Self {
        Self {
            message: error.to_string(),
            cursor,
            occurred_at: OffsetDateTime::now_utc(),
            error,
        }
    }
}

/// Snapshot of one cached query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    /// Pages in fetch order, oldest first.
    pub pages: Vec<Page<T>>,
    pub error: Option<ErrorInfo>,
    /// Set by invalidation; cleared by a successful first-page fetch that
    /// started after the last invalidation.
    pub stale: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(skip)]
    pub(crate) invalidations: u64,
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            pages: Vec::new(),
            error: None,
            stale: false,
            updated_at: None,
            invalidations: 0,
        }
    }

    /// A settled state holding the given pages.
    pub fn success(pages: Vec<Page<T>>) -> Self {
        Self {
            status: QueryStatus::Success,
            pages,
            error: None,
            stale: false,
            updated_at: Some(OffsetDateTime::now_utc()),
            invalidations: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// True when the cached pages can be served without fetching.
    pub fn is_fresh(&self) -> bool {
        !self.stale && !self.pages.is_empty()
    }

    pub fn last_cursor(&self) -> Option<&Cursor> {
        self.pages.last().and_then(|page| page.next_cursor.as_ref())
    }

    pub fn has_next_page(&self) -> bool {
        self.last_cursor().is_some()
    }

    /// All items across pages, in page order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.pages.iter().map(|page| page.items.len()).sum()
    }
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}
