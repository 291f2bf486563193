//! Optimistic Mutation Wrapper - local-first writes with automatic rollback.
//!
//! ```text
//!   acquire per-key slot (FIFO)
//!     │
//!     ├─ before_mutate
//!     ├─ snapshot = cache.snapshot(key)
//!     ├─ cache.write(key, local)                       optimistic patch
//!     ├─ remote().await
//!     │     ├─ Ok(v)  ─► reconcile(v) ─► on_settle ─► invalidate dependents
//!     │     │            ─► refetch key ─► after_settle(Reconciled)
//!     │     └─ Err(e) ─► on_settle ─► restore(snapshot) ─► after_settle(RolledBack)
//!     │
//!   release slot
//! ```
//!
//! Holding the slot until the cache settled gives sequential composition:
//! the next mutation on the same key snapshots the settled state, and a
//! rollback can never clobber another mutation's patch.

mod observer;
mod queue;
mod runner;
mod scope;

use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;
use crate::cache::{CacheError, CollectionKey};
use crate::record::RecordError;

pub use observer::{MutationContext, MutationObserver, Outcome, Resolution};
pub use queue::KeyedQueue;
pub use runner::{MutationRunner, OptimisticMutation};
pub use scope::{Scope, ScopeGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
    /// Anything else, e.g. "toggle" or "reorder".
    Custom(&'static str),
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
            MutationKind::Custom(name) => *name,
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with the optimistic patch when the remote call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RollbackPolicy {
    /// Restore the snapshot taken right before the patch.
    #[default]
    RevertToSnapshot,
    /// Keep the patch and mark the key stale. For idempotent deletes.
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// The remote write failed; the cache was rolled back per policy.
    #[error("remote write to {key} failed: {source}")]
    Remote {
        key: CollectionKey,
        #[source]
        source: BackendError,
    },
    /// Records under a temporary id only exist locally and cannot be written remotely.
    #[error("record {0} has not been created remotely yet")]
    TemporaryId(String),
    #[error("no {table} record with id {id} in the cache")]
    NotFound { table: &'static str, id: String },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl MutationError {
    /// The backend error behind a failed remote write.
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            MutationError::Remote { source, .. } => Some(source),
            _ => None,
        }
    }
}
