use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    KeyedQueue, MutationContext, MutationError, MutationKind, MutationObserver, Outcome,
    Resolution, RollbackPolicy, Scope,
};
use crate::backend::BackendError;
use crate::cache::{CollectionKey, QueryCache};

type LocalUpdate<R> = Box<dyn FnOnce(&[R]) -> Vec<R> + Send>;
type Reconcile<R, T> = Box<dyn FnOnce(&[R], &T) -> Vec<R> + Send>;

/// One optimistic mutation: what to patch locally and how to settle it.
///
/// `R` is the record type cached under `key`, `T` what the remote call returns.
pub struct OptimisticMutation<R, T> {
    key: CollectionKey,
    kind: MutationKind,
    table: &'static str,
    entity_id: Option<String>,
    label: String,
    local: Option<LocalUpdate<R>>,
    reconcile: Option<Reconcile<R, T>>,
    settled_id: Option<fn(&T) -> Option<String>>,
    rollback: RollbackPolicy,
    invalidates: Vec<CollectionKey>,
    scope: Option<Scope>,
}

impl<R, T> OptimisticMutation<R, T>
where
    R: Send + Sync + 'static,
{
    pub fn new(key: CollectionKey, kind: MutationKind) -> Self {
        Self {
            label: key.root().unwrap_or_default().to_string(),
            key,
            kind,
            table: "",
            entity_id: None,
            local: None,
            reconcile: None,
            settled_id: None,
            rollback: RollbackPolicy::default(),
            invalidates: Vec::new(),
            scope: None,
        }
    }

    pub fn table(mut self, table: &'static str) -> Self {
        self.table = table;
        self
    }

    pub fn entity(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Pure transform applied to the cached list before the remote call.
    pub fn local(mut self, update: impl FnOnce(&[R]) -> Vec<R> + Send + 'static) -> Self {
        self.local = Some(Box::new(update));
        self
    }

    /// Transform applied with the remote result before the refetch,
    /// e.g. swapping a temporary record for the canonical one.
    pub fn reconcile(mut self, update: impl FnOnce(&[R], &T) -> Vec<R> + Send + 'static) -> Self {
        self.reconcile = Some(Box::new(update));
        self
    }

    /// Extracts the id of the affected record from the remote result.
    pub fn settled_id(mut self, extract: fn(&T) -> Option<String>) -> Self {
        self.settled_id = Some(extract);
        self
    }

    pub fn rollback(mut self, policy: RollbackPolicy) -> Self {
        self.rollback = policy;
        self
    }

    /// Dependent key invalidated after a successful remote call.
    pub fn invalidates(mut self, key: CollectionKey) -> Self {
        self.invalidates.push(key);
        self
    }

    pub fn scope(mut self, scope: Option<Scope>) -> Self {
        self.scope = scope;
        self
    }
}

/// Runs [`OptimisticMutation`]s against a [`QueryCache`].
///
/// Clones share the cache, the per-key queue and the observers.
#[derive(Clone)]
pub struct MutationRunner {
    cache: QueryCache,
    queue: Arc<KeyedQueue>,
    observers: Arc<Vec<Arc<dyn MutationObserver>>>,
}

impl MutationRunner {
    pub fn new(cache: QueryCache) -> Self {
        Self {
            cache,
            queue: Arc::new(KeyedQueue::new()),
            observers: Arc::new(Vec::new()),
        }
    }

    /// Add an observer. Observers see mutations in registration order.
    pub fn with_observer(mut self, observer: Arc<dyn MutationObserver>) -> Self {
        let mut observers: Vec<_> = self.observers.iter().cloned().collect();
        observers.push(observer);
        self.observers = Arc::new(observers);
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// True while a mutation on `key` is running or queued.
    pub fn in_flight(&self, key: &CollectionKey) -> bool {
        self.queue.is_busy(key)
    }

    /// Apply `mutation` optimistically, call `remote`, then reconcile or roll back.
    ///
    /// Mutations on the same key run one at a time in issue order. Every
    /// failure of `remote` takes the rollback path regardless of its kind.
    pub async fn run<R, T, F, Fut>(
        &self,
        mutation: OptimisticMutation<R, T>,
        remote: F,
    ) -> Result<T, MutationError>
    where
        R: Send + Sync + 'static,
        T: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, BackendError>> + Send,
    {
        let OptimisticMutation {
            key,
            kind,
            table,
            entity_id,
            label,
            local,
            reconcile,
            settled_id,
            rollback,
            invalidates,
            scope,
        } = mutation;

        let mut ctx = MutationContext {
            table,
            key,
            kind,
            entity_id,
            label,
            scope,
        };
        let key = ctx.key.clone();

        let _slot = self.queue.acquire(&key).await;
        debug!(key = %key, kind = %kind, "mutation acquired slot");

        for observer in self.observers.iter() {
            observer.before_mutate(&ctx).await;
        }

        let snapshot = self.cache.snapshot::<R>(&key)?;
        if let Some(local) = local {
            self.cache.write(&key, local)?;
        }

        match remote().await {
            Ok(value) => {
                if let Some(reconcile) = reconcile {
                    // The remote write already landed; the refetch below still repairs the entry.
                    if let Err(err) = self.cache.write(&key, |current| reconcile(current, &value)) {
                        warn!(key = %key, error = %err, "local reconcile failed, waiting for refetch");
                    }
                }
                if let Some(id) = settled_id.and_then(|extract| extract(&value)) {
                    ctx.entity_id = Some(id);
                }
                for observer in self.observers.iter() {
                    observer.on_settle(&ctx, Outcome::Succeeded).await;
                }

                for dependent in &invalidates {
                    self.cache.invalidate(dependent);
                }
                if let Err(err) = self.cache.reconcile(&key).await {
                    warn!(key = %key, error = %err, "refetch after mutation failed, keeping local state");
                }

                for observer in self.observers.iter() {
                    observer.after_settle(&ctx, Resolution::Reconciled).await;
                }
                info!(key = %key, kind = %kind, id = ?ctx.entity_id, "mutation reconciled");
                Ok(value)
            }
            Err(source) => {
                let error = MutationError::Remote {
                    key: key.clone(),
                    source,
                };
                for observer in self.observers.iter() {
                    observer.on_settle(&ctx, Outcome::Failed(&error)).await;
                }

                let resolution = match rollback {
                    RollbackPolicy::RevertToSnapshot => {
                        self.cache.restore(snapshot)?;
                        Resolution::RolledBack
                    }
                    RollbackPolicy::NoOp => {
                        self.cache.invalidate(&key);
                        Resolution::LeftAsIs
                    }
                };
                warn!(key = %key, kind = %kind, error = %error, ?resolution, "mutation failed");

                for observer in self.observers.iter() {
                    observer.after_settle(&ctx, resolution).await;
                }
                Err(error)
            }
        }
    }
}
