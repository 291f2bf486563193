//! Query Cache - last known-good state of every managed collection.
//!
//! The cache is process-wide shared state handed around as a cheap `Clone`
//! handle. Reads go through [`QueryCache::read`], [`QueryCache::fetch`] or an
//! [`Observer`]; only the mutation runner writes.
//!
//! ```text
//!   read(key, loader) ──► fresh? ──yes──► Ready { data }
//!                           │
//!                           no ──► spawn loader (single flight) ──► Pending / stale data
//!
//!   invalidate(key) ──► mark stale ──► observed? ──yes──► background refetch
//!
//!   write(key, f) ──► data = f(data), supersedes in-flight fetches
//! ```

mod key;
mod observer;
mod query_cache;
mod snapshot;

use std::sync::Arc;

use thiserror::Error;

use crate::backend::BackendError;

pub use key::CollectionKey;
pub use observer::Observer;
pub use query_cache::QueryCache;
pub use snapshot::Snapshot;

/// What a consumer sees when reading a collection.
#[derive(Debug, Clone)]
pub enum QueryState<R> {
    /// Nothing cached yet; a fetch is running or will run.
    Pending,
    /// Cached data. `stale` is true while a refetch is due or running.
    Ready { data: Arc<Vec<R>>, stale: bool },
    /// The last fetch failed. The last good value, if any, is kept.
    Failed {
        error: BackendError,
        last_good: Option<Arc<Vec<R>>>,
    },
}

impl<R> QueryState<R> {
    /// Best data available: fresh, stale or last good.
    pub fn data(&self) -> Option<&Arc<Vec<R>>> {
        match self {
            QueryState::Pending => None,
            QueryState::Ready { data, .. } => Some(data),
            QueryState::Failed { last_good, .. } => last_good.as_ref(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, QueryState::Pending)
    }

    pub fn error(&self) -> Option<&BackendError> {
        match self {
            QueryState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Error type for cache operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The entry under `key` was created for a different record type.
    #[error("cache entry {key} holds {found}, not {expected}")]
    TypeMismatch {
        key: CollectionKey,
        expected: &'static str,
        found: &'static str,
    },
    #[error("no loader registered for {0}")]
    NoLoader(CollectionKey),
    #[error("loading {key} failed: {source}")]
    Load {
        key: CollectionKey,
        #[source]
        source: BackendError,
    },
}
