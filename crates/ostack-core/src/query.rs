//! Query string and pagination helpers.
//!
//! OpenStack list APIs share the same filter-and-page conventions: optional
//! exact-match filters plus `limit`/`marker` pagination. These helpers keep
//! the client crates from spelling that out per resource.

use std::fmt::Display;
use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};

use crate::error::{Error, Result};

/// Default page size used by the paginated list streams.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Builder for assembling query parameter pairs.
#[derive(Debug, Default, Clone)]
pub struct QueryParams {
    pairs: Vec<(&'static str, String)>,
}

impl QueryParams {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    /// Append a key/value pair when the value is present.
    pub fn push_opt<T>(&mut self, key: &'static str, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.pairs.push((key, value.to_string()));
        }
    }

    /// Append a required key/value pair.
    pub fn push<T>(&mut self, key: &'static str, value: T)
    where
        T: Display,
    {
        self.pairs.push((key, value.to_string()));
    }

    /// Append the `limit`/`marker` pair for one page.
    pub fn push_page(&mut self, page: &PageRequest) {
        self.push("limit", page.limit);
        self.push_opt("marker", page.marker.as_deref());
    }

    /// Return the collected key/value pairs.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(&'static str, String)> {
        self.pairs
    }

    /// Returns true if no parameters have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Cursor for marker-based pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Maximum items per page
    pub limit: u32,
    /// Id of the last item of the previous page
    pub marker: Option<String>,
}

impl PageRequest {
    /// First page with the given size.
    #[must_use]
    pub fn first(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            marker: None,
        }
    }

    /// The page following one that ended with `last_id` and held `count`
    /// items, or `None` when that page was the last.
    #[must_use]
    pub fn next(&self, count: usize, last_id: Option<String>) -> Option<Self> {
        if count < self.limit as usize {
            return None;
        }
        last_id.map(|marker| Self {
            limit: self.limit,
            marker: Some(marker),
        })
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// A listed resource that can serve as a pagination marker.
pub trait Paged {
    /// The value passed as `marker` to fetch the page after this item.
    fn marker(&self) -> String;
}

/// Reduce the results of an exact-name lookup to at most one item.
///
/// # Errors
///
/// Returns [`Error::Conflict`] when more than one `kind` carries `name`.
pub fn single_match<T>(kind: &str, name: &str, mut items: Vec<T>) -> Result<Option<T>> {
    match items.len() {
        0 | 1 => Ok(items.pop()),
        count => Err(Error::Conflict(format!(
            "{count} {kind} resources are named `{name}`"
        ))),
    }
}

/// Lazily walk a marker-paginated collection.
///
/// `fetch` is called with each page request in turn; no request is made
/// until the stream is polled, and the stream ends after the first page
/// shorter than the limit.
pub fn paginate<T, F, Fut>(first: PageRequest, fetch: F) -> impl Stream<Item = Result<T>>
where
    T: Paged,
    F: FnMut(PageRequest) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    stream::try_unfold((Some(first), fetch), |(page, mut fetch)| async move {
        let Some(page) = page else {
            return Ok(None);
        };
        let items = fetch(page.clone()).await?;
        let next = page.next(items.len(), items.last().map(Paged::marker));
        let batch = stream::iter(items.into_iter().map(Ok::<T, Error>));
        Ok::<_, Error>(Some((batch, (next, fetch))))
    })
    .try_flatten()
}
