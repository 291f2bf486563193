//! QueryCache - keyed, type-erased collection cache with a staleness policy.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{CacheError, CollectionKey, Observer, QueryState, Snapshot};
use crate::backend::BackendError;
use crate::config::CacheConfig;

type Erased = Arc<dyn Any + Send + Sync>;
type Loader = Arc<dyn Fn() -> BoxFuture<'static, Result<Erased, BackendError>> + Send + Sync>;

struct Entry {
    data: Option<Erased>,
    type_id: TypeId,
    type_name: &'static str,
    fetched_at: Option<Instant>,
    invalidated: bool,
    error: Option<BackendError>,
    loader: Option<Loader>,
    /// Epoch the running fetch was started at.
    fetching: Option<u64>,
    /// Bumped by every write; fetches started at an older epoch are discarded.
    epoch: u64,
    observers: usize,
    tick: watch::Sender<u64>,
}

impl Entry {
    fn new<R: Send + Sync + 'static>() -> Self {
        Self {
            data: None,
            type_id: TypeId::of::<Vec<R>>(),
            type_name: type_name::<R>(),
            fetched_at: None,
            invalidated: false,
            error: None,
            loader: None,
            fetching: None,
            epoch: 0,
            observers: 0,
            tick: watch::channel(0).0,
        }
    }

    fn notify(&self) {
        self.tick.send_modify(|n| *n = n.wrapping_add(1));
    }

    fn is_fresh(&self, stale_after: Option<Duration>) -> bool {
        if self.invalidated || self.data.is_none() {
            return false;
        }
        match (self.fetched_at, stale_after) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(at), Some(window)) => at.elapsed() < window,
        }
    }

    /// A failed fetch is only retried after an invalidation or an explicit refetch.
    fn needs_fetch(&self, stale_after: Option<Duration>) -> bool {
        let blocked_by_error = self.error.is_some() && !self.invalidated;
        !self.is_fresh(stale_after) && self.fetching != Some(self.epoch) && !blocked_by_error
    }

    fn typed<R: Send + Sync + 'static>(
        &self,
        key: &CollectionKey,
    ) -> Result<Option<Arc<Vec<R>>>, CacheError> {
        match &self.data {
            None => Ok(None),
            Some(any) => Arc::clone(any)
                .downcast::<Vec<R>>()
                .map(Some)
                .map_err(|_| CacheError::TypeMismatch {
                    key: key.clone(),
                    expected: type_name::<R>(),
                    found: self.type_name,
                }),
        }
    }

    fn state<R: Send + Sync + 'static>(
        &self,
        key: &CollectionKey,
        stale_after: Option<Duration>,
    ) -> Result<QueryState<R>, CacheError> {
        let data = self.typed::<R>(key)?;
        Ok(match (&self.error, data) {
            (Some(error), last_good) => QueryState::Failed {
                error: error.clone(),
                last_good,
            },
            (None, Some(data)) => QueryState::Ready {
                data,
                stale: !self.is_fresh(stale_after),
            },
            (None, None) => QueryState::Pending,
        })
    }

    fn begin_fetch(&mut self) -> Option<(Loader, u64)> {
        let loader = self.loader.clone()?;
        self.fetching = Some(self.epoch);
        Some((loader, self.epoch))
    }
}

struct Inner {
    entries: Mutex<HashMap<CollectionKey, Entry>>,
    stale_after: Option<Duration>,
}

/// Process-wide collection cache.
///
/// Entries are keyed by [`CollectionKey`] and hold a `Vec<R>` for one record
/// type `R`; reading an entry as another type is a [`CacheError::TypeMismatch`].
/// Clone-friendly via Arc: clones share the same entries.
///
/// Internal locks are never held across an `.await`. `write` is synchronous
/// and visible to the very next read.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    /// `stale_after = None` keeps data fresh until it is invalidated.
    pub fn new(stale_after: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                stale_after,
            }),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.stale_after())
    }

    pub fn stale_after(&self) -> Option<Duration> {
        self.inner.stale_after
    }

    /// Return the cached state of `key`, starting a background fetch through
    /// `loader` when the entry is missing or stale.
    ///
    /// Never waits for the loader. Loader failures show up as
    /// [`QueryState::Failed`] on later reads.
    pub fn read<R, F, Fut>(&self, key: &CollectionKey, loader: F) -> Result<QueryState<R>, CacheError>
    where
        R: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>, BackendError>> + Send + 'static,
    {
        let stale_after = self.inner.stale_after;
        let (state, job) = {
            let mut entries = self.lock();
            let entry = Self::entry_mut::<R>(&mut entries, key)?;
            entry.loader = Some(erase(loader));
            let job = if entry.needs_fetch(stale_after) {
                entry.begin_fetch()
            } else {
                None
            };
            (entry.state::<R>(key, stale_after)?, job)
        };

        if let Some((loader, epoch)) = job {
            self.spawn_fetch(key.clone(), loader, epoch);
        }
        Ok(state)
    }

    /// Return fresh data for `key`, loading it first if needed.
    pub async fn fetch<R, F, Fut>(
        &self,
        key: &CollectionKey,
        loader: F,
    ) -> Result<Arc<Vec<R>>, CacheError>
    where
        R: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>, BackendError>> + Send + 'static,
    {
        {
            let mut entries = self.lock();
            let entry = Self::entry_mut::<R>(&mut entries, key)?;
            entry.loader = Some(erase(loader));
            if entry.error.is_none() && entry.is_fresh(self.inner.stale_after) {
                if let Some(data) = entry.typed::<R>(key)? {
                    return Ok(data);
                }
            }
        }

        let loaded = self.refetch(key).await?;
        match self.peek::<R>(key)? {
            Some(data) => Ok(data),
            None => loaded.downcast::<Vec<R>>().map_err(|_| CacheError::TypeMismatch {
                key: key.clone(),
                expected: type_name::<R>(),
                found: "unknown",
            }),
        }
    }

    /// Register an observer for `key`, starting a fetch if the entry needs one.
    pub fn observe<R, F, Fut>(&self, key: &CollectionKey, loader: F) -> Result<Observer<R>, CacheError>
    where
        R: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<R>, BackendError>> + Send + 'static,
    {
        let (rx, job) = {
            let mut entries = self.lock();
            let entry = Self::entry_mut::<R>(&mut entries, key)?;
            entry.loader = Some(erase(loader));
            entry.observers += 1;
            let job = if entry.needs_fetch(self.inner.stale_after) {
                entry.begin_fetch()
            } else {
                None
            };
            (entry.tick.subscribe(), job)
        };

        if let Some((loader, epoch)) = job {
            self.spawn_fetch(key.clone(), loader, epoch);
        }
        Ok(Observer::new(self.clone(), key.clone(), rx))
    }

    /// Current state of `key` without triggering any fetch.
    pub fn state<R: Send + Sync + 'static>(
        &self,
        key: &CollectionKey,
    ) -> Result<QueryState<R>, CacheError> {
        let entries = self.lock();
        match entries.get(key) {
            Some(entry) => entry.state(key, self.inner.stale_after),
            None => Ok(QueryState::Pending),
        }
    }

    /// Cached data of `key`, if any, without triggering any fetch.
    pub fn peek<R: Send + Sync + 'static>(
        &self,
        key: &CollectionKey,
    ) -> Result<Option<Arc<Vec<R>>>, CacheError> {
        let entries = self.lock();
        match entries.get(key) {
            Some(entry) => entry.typed(key),
            None => Ok(None),
        }
    }

    /// Mark `key` stale; refetch in the background if it is observed.
    pub fn invalidate(&self, key: &CollectionKey) -> usize {
        self.invalidate_where(|k| k == key)
    }

    /// Mark every matching key stale; refetch the observed ones in the background.
    /// Returns the number of entries marked.
    pub fn invalidate_where(&self, predicate: impl Fn(&CollectionKey) -> bool) -> usize {
        let mut jobs = Vec::new();
        let mut marked = 0;
        {
            let mut entries = self.lock();
            for (key, entry) in entries.iter_mut().filter(|(key, _)| predicate(key)) {
                entry.invalidated = true;
                entry.notify();
                marked += 1;
                if entry.observers > 0 && entry.fetching != Some(entry.epoch) {
                    if let Some(job) = entry.begin_fetch() {
                        jobs.push((key.clone(), job));
                    }
                }
            }
        }

        for (key, (loader, epoch)) in jobs {
            debug!(key = %key, "invalidated observed entry, refetching");
            self.spawn_fetch(key, loader, epoch);
        }
        marked
    }

    /// Run the registered loader for `key` now and wait for it.
    pub async fn refetch(&self, key: &CollectionKey) -> Result<Arc<dyn Any + Send + Sync>, CacheError> {
        let (loader, epoch) = {
            let mut entries = self.lock();
            let entry = entries
                .get_mut(key)
                .ok_or_else(|| CacheError::NoLoader(key.clone()))?;
            entry.invalidated = true;
            entry
                .begin_fetch()
                .ok_or_else(|| CacheError::NoLoader(key.clone()))?
        };
        self.run_fetch(key.clone(), loader, epoch)
            .await
            .map_err(|source| CacheError::Load {
                key: key.clone(),
                source,
            })
    }

    /// Invalidate `key` and, when a loader is registered, wait for the refetch.
    /// Returns whether a refetch ran.
    pub(crate) async fn reconcile(&self, key: &CollectionKey) -> Result<bool, CacheError> {
        let has_loader = {
            let mut entries = self.lock();
            match entries.get_mut(key) {
                Some(entry) => {
                    entry.invalidated = true;
                    entry.loader.is_some()
                }
                None => false,
            }
        };
        if !has_loader {
            return Ok(false);
        }
        self.refetch(key).await.map(|_| true)
    }

    /// Replace the data of `key` with `updater(current)`.
    ///
    /// Missing data is passed as an empty slice. Any fetch started before the
    /// write is discarded when it completes. `updater` runs under the cache
    /// lock and must not call back into the cache.
    pub(crate) fn write<R, F>(&self, key: &CollectionKey, updater: F) -> Result<(), CacheError>
    where
        R: Send + Sync + 'static,
        F: FnOnce(&[R]) -> Vec<R>,
    {
        let mut entries = self.lock();
        let entry = Self::entry_mut::<R>(&mut entries, key)?;
        let current = entry.typed::<R>(key)?;
        let next = updater(current.as_deref().map(Vec::as_slice).unwrap_or(&[]));
        entry.data = Some(Arc::new(next) as Erased);
        entry.epoch += 1;
        entry.notify();
        debug!(key = %key, epoch = entry.epoch, "cache entry written");
        Ok(())
    }

    /// Copy of the current state of `key` for a later [`QueryCache::restore`].
    pub fn snapshot<R: Send + Sync + 'static>(
        &self,
        key: &CollectionKey,
    ) -> Result<Snapshot<R>, CacheError> {
        Ok(Snapshot::new(key.clone(), self.peek::<R>(key)?))
    }

    /// Put a snapshot back exactly as it was taken.
    pub(crate) fn restore<R: Send + Sync + 'static>(
        &self,
        snapshot: Snapshot<R>,
    ) -> Result<(), CacheError> {
        let key = snapshot.key().clone();
        let mut entries = self.lock();
        let entry = Self::entry_mut::<R>(&mut entries, &key)?;
        entry.data = snapshot.into_data().map(|data| data as Erased);
        entry.epoch += 1;
        entry.notify();
        debug!(key = %key, epoch = entry.epoch, "cache entry restored from snapshot");
        Ok(())
    }

    pub fn is_observed(&self, key: &CollectionKey) -> bool {
        self.lock().get(key).is_some_and(|entry| entry.observers > 0)
    }

    pub fn keys(&self) -> Vec<CollectionKey> {
        let mut keys: Vec<_> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn remove(&self, key: &CollectionKey) {
        self.lock().remove(key);
    }

    /// Drop every entry (shutdown, or between tests).
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub(crate) fn unobserve(&self, key: &CollectionKey) {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }

    fn spawn_fetch(&self, key: CollectionKey, loader: Loader, epoch: u64) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let cache = self.clone();
                handle.spawn(async move {
                    // Failures are recorded on the entry.
                    let _ = cache.run_fetch(key, loader, epoch).await;
                });
            }
            Err(_) => {
                warn!(key = %key, "no async runtime, background fetch skipped");
                if let Some(entry) = self.lock().get_mut(&key) {
                    if entry.fetching == Some(epoch) {
                        entry.fetching = None;
                    }
                }
            }
        }
    }

    async fn run_fetch(
        &self,
        key: CollectionKey,
        loader: Loader,
        epoch: u64,
    ) -> Result<Erased, BackendError> {
        debug!(key = %key, epoch, "fetching");
        let result = loader().await;

        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(&key) else {
            return result;
        };
        if entry.fetching == Some(epoch) {
            entry.fetching = None;
        }
        if entry.epoch != epoch {
            debug!(key = %key, epoch, current = entry.epoch, "discarding superseded fetch");
            return result;
        }

        match &result {
            Ok(data) => {
                entry.data = Some(Arc::clone(data));
                entry.fetched_at = Some(Instant::now());
                entry.invalidated = false;
                entry.error = None;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "fetch failed, keeping last good value");
                entry.invalidated = false;
                entry.error = Some(err.clone());
            }
        }
        entry.notify();
        result
    }

    fn entry_mut<'a, R: Send + Sync + 'static>(
        entries: &'a mut HashMap<CollectionKey, Entry>,
        key: &CollectionKey,
    ) -> Result<&'a mut Entry, CacheError> {
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new::<R>());
        if entry.type_id != TypeId::of::<Vec<R>>() {
            return Err(CacheError::TypeMismatch {
                key: key.clone(),
                expected: type_name::<R>(),
                found: entry.type_name,
            });
        }
        Ok(entry)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CollectionKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn erase<R, F, Fut>(loader: F) -> Loader
where
    R: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<R>, BackendError>> + Send + 'static,
{
    Arc::new(move || {
        let fut = loader();
        async move { fut.await.map(|records| Arc::new(records) as Erased) }.boxed()
    })
}
