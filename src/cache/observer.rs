use std::marker::PhantomData;

use tokio::sync::watch;

use super::{CacheError, CollectionKey, QueryCache, QueryState};

/// A live view of one cache entry.
///
/// While an observer is alive the key counts as observed, so invalidations
/// trigger a background refetch. Dropping the observer unregisters it.
pub struct Observer<R> {
    cache: QueryCache,
    key: CollectionKey,
    rx: watch::Receiver<u64>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Send + Sync + 'static> Observer<R> {
    pub(crate) fn new(cache: QueryCache, key: CollectionKey, rx: watch::Receiver<u64>) -> Self {
        Self {
            cache,
            key,
            rx,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    pub fn state(&self) -> Result<QueryState<R>, CacheError> {
        self.cache.state(&self.key)
    }

    /// Wait for the entry to change. Returns false once the entry is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the state satisfies `predicate` (or the entry is gone).
    pub async fn wait_for(
        &mut self,
        predicate: impl Fn(&QueryState<R>) -> bool,
    ) -> Result<QueryState<R>, CacheError> {
        loop {
            let state = self.state()?;
            if predicate(&state) || !self.changed().await {
                return Ok(state);
            }
        }
    }
}

impl<R> Drop for Observer<R> {
    fn drop(&mut self) {
        self.cache.unobserve(&self.key);
    }
}
