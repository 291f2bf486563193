//! Managed collections - one typed, cached list per backend table.
//!
//! A [`ManagedCollection`] ties a record type to its cache key, the backend
//! query that loads it, and the three optimistic mutations (create, update,
//! delete). Every screen of the admin panel is one of these.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::backend::{Backend, BackendError, Filter, Order, Query};
use crate::cache::{CacheError, CollectionKey, Observer, QueryState};
use crate::mutation::{
    MutationError, MutationKind, MutationRunner, OptimisticMutation, RollbackPolicy, Scope,
};
use crate::record::{from_row, from_rows, is_temporary, to_patch, to_row, Record, TempId};

/// Loader closure registered with the cache for one collection.
pub type CollectionLoader<R> =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Vec<R>, BackendError>> + Send + Sync>;

pub struct ManagedCollection<R> {
    backend: Arc<dyn Backend>,
    runner: MutationRunner,
    key: CollectionKey,
    query: Query,
    label: String,
    dependents: Vec<CollectionKey>,
    scope: Option<Scope>,
    _marker: PhantomData<fn() -> R>,
}

impl<R> Clone for ManagedCollection<R> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            runner: self.runner.clone(),
            key: self.key.clone(),
            query: self.query.clone(),
            label: self.label.clone(),
            dependents: self.dependents.clone(),
            scope: self.scope.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Record> ManagedCollection<R> {
    /// Collection of every row of `R::TABLE`, newest first, keyed by the table name.
    pub fn new(backend: Arc<dyn Backend>, runner: MutationRunner) -> Self {
        Self {
            backend,
            runner,
            key: CollectionKey::of(R::TABLE),
            query: Query::all().order(Order::desc("created_at")),
            label: R::TABLE.to_string(),
            dependents: Vec::new(),
            scope: None,
            _marker: PhantomData,
        }
    }

    pub fn with_key(mut self, key: CollectionKey) -> Self {
        self.key = key;
        self
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Entity name used in notifications and activity logs.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Another key showing the same table, refreshed after every successful mutation.
    pub fn invalidating(mut self, key: CollectionKey) -> Self {
        self.dependents.push(key);
        self
    }

    /// Copy of this collection whose mutations belong to `scope`.
    pub fn with_scope(&self, scope: Scope) -> Self {
        let mut scoped = self.clone();
        scoped.scope = Some(scope);
        scoped
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dependents(&self) -> &[CollectionKey] {
        &self.dependents
    }

    pub fn loader(&self) -> CollectionLoader<R> {
        let backend = Arc::clone(&self.backend);
        let query = self.query.clone();
        Arc::new(move || {
            let backend = Arc::clone(&backend);
            let query = query.clone();
            async move {
                let rows = backend.select(R::TABLE, &query).await?;
                from_rows::<R>(rows).map_err(|e| BackendError::Payload(e.to_string()))
            }
            .boxed()
        })
    }

    /// Cached state, starting a background load when missing or stale.
    pub fn list(&self) -> Result<QueryState<R>, CacheError> {
        let loader = self.loader();
        self.runner.cache().read(&self.key, move || loader())
    }

    pub async fn fetch(&self) -> Result<Arc<Vec<R>>, CacheError> {
        let loader = self.loader();
        self.runner.cache().fetch(&self.key, move || loader()).await
    }

    pub fn observe(&self) -> Result<Observer<R>, CacheError> {
        let loader = self.loader();
        self.runner.cache().observe(&self.key, move || loader())
    }

    /// True while a mutation on this collection is running or queued.
    pub fn is_mutating(&self) -> bool {
        self.runner.in_flight(&self.key)
    }

    /// Insert `draft` and return the stored record.
    ///
    /// The draft shows up at once under a temporary id; once the backend
    /// answers, the temporary entry is replaced by the stored record and
    /// the list is refetched.
    pub async fn create(&self, draft: R) -> Result<R, MutationError> {
        let mut pending = draft;
        let temp_id = TempId::next();
        pending.set_id(temp_id.clone());
        let row = to_row(&pending)?;

        let mutation = self
            .mutation::<R>(MutationKind::Create)
            .entity(temp_id.clone())
            .local(move |records| {
                let mut next = records.to_vec();
                next.push(pending);
                next
            })
            .reconcile(move |records, created: &R| {
                records
                    .iter()
                    .map(|r| if r.id() == temp_id { created.clone() } else { r.clone() })
                    .collect()
            })
            .settled_id(|created: &R| Some(created.id().to_string()));

        let backend = Arc::clone(&self.backend);
        self.runner
            .run(mutation, move || async move {
                let stored = backend.insert(R::TABLE, row).await?;
                from_row::<R>(stored).map_err(|e| BackendError::Payload(e.to_string()))
            })
            .await
    }

    /// Write every field of `record` to the row with the same id.
    pub async fn update(&self, record: R) -> Result<R, MutationError> {
        if record.is_temporary() {
            return Err(MutationError::TemporaryId(record.id().to_string()));
        }
        let id = record.id().to_string();
        let patch = to_patch(&record)?;
        let filter = Filter::eq(R::ID_FIELD, id.clone());

        let replacement = record.clone();
        let mutation = self
            .mutation::<R>(MutationKind::Update)
            .entity(id.clone())
            .local(move |records| {
                records
                    .iter()
                    .map(|r| {
                        if r.id() == replacement.id() {
                            replacement.clone()
                        } else {
                            r.clone()
                        }
                    })
                    .collect()
            });

        let backend = Arc::clone(&self.backend);
        self.runner
            .run(mutation, move || async move {
                let affected = backend.update(R::TABLE, patch, &filter).await?;
                if affected == 0 {
                    return Err(BackendError::NotFound(format!("{}/{}", R::TABLE, id)));
                }
                Ok(record)
            })
            .await
    }

    /// Update the cached record `id` with `edit`.
    pub async fn patch(&self, id: &str, edit: impl FnOnce(&mut R)) -> Result<R, MutationError> {
        let current = self
            .runner
            .cache()
            .peek::<R>(&self.key)?
            .and_then(|records| records.iter().find(|r| r.id() == id).cloned());
        let mut record = current.ok_or_else(|| MutationError::NotFound {
            table: R::TABLE,
            id: id.to_string(),
        })?;
        edit(&mut record);
        record.set_id(id.to_string());
        self.update(record).await
    }

    /// Delete `id`, restoring it locally if the backend refuses.
    ///
    /// Deleting an id that is already gone succeeds.
    pub async fn delete(&self, id: &str) -> Result<(), MutationError> {
        self.delete_with(id, RollbackPolicy::RevertToSnapshot).await
    }

    pub async fn delete_with(&self, id: &str, policy: RollbackPolicy) -> Result<(), MutationError> {
        if is_temporary(id) {
            return Err(MutationError::TemporaryId(id.to_string()));
        }
        let target = id.to_string();
        let filter = Filter::eq(R::ID_FIELD, id);

        let mutation = self
            .mutation::<()>(MutationKind::Delete)
            .entity(id)
            .rollback(policy)
            .local(move |records| records.iter().filter(|r| r.id() != target).cloned().collect());

        let backend = Arc::clone(&self.backend);
        self.runner
            .run(mutation, move || async move {
                backend.delete(R::TABLE, &filter).await.map(|_| ())
            })
            .await
    }

    fn mutation<T>(&self, kind: MutationKind) -> OptimisticMutation<R, T> {
        self.dependents.iter().fold(
            OptimisticMutation::new(self.key.clone(), kind)
                .table(R::TABLE)
                .label(self.label.clone())
                .scope(self.scope.clone()),
            |mutation, key| mutation.invalidates(key.clone()),
        )
    }
}
