use async_trait::async_trait;

use super::{MutationError, MutationKind, Scope};
use crate::cache::CollectionKey;

/// Describes one running mutation to its observers.
#[derive(Debug, Clone)]
pub struct MutationContext {
    pub key: CollectionKey,
    pub kind: MutationKind,
    /// Backend table the mutation writes to.
    pub table: &'static str,
    /// Id of the affected record, when known before the remote call.
    pub entity_id: Option<String>,
    /// Human readable entity name for messages ("Project", "FAQ").
    pub label: String,
    pub scope: Option<Scope>,
}

impl MutationContext {
    /// True once the owning component went away.
    pub fn is_detached(&self) -> bool {
        self.scope.as_ref().is_some_and(Scope::is_disposed)
    }
}

/// Result of the remote call, as seen by `on_settle`.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    Succeeded,
    Failed(&'a MutationError),
}

/// What happened to the cache after the remote call settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Remote success; the key was invalidated and refetched.
    Reconciled,
    /// Remote failure; the snapshot was restored.
    RolledBack,
    /// Remote failure under [`RollbackPolicy::NoOp`](super::RollbackPolicy::NoOp).
    LeftAsIs,
}

/// Hooks around every mutation.
///
/// Observers are called in registration order and never affect the cache.
/// All methods default to no-ops.
#[async_trait]
pub trait MutationObserver: Send + Sync {
    /// Before the snapshot is taken and the optimistic patch applied.
    async fn before_mutate(&self, _ctx: &MutationContext) {}

    /// Right after the remote call settled, before any cache reconciliation.
    async fn on_settle(&self, _ctx: &MutationContext, _outcome: Outcome<'_>) {}

    /// After the cache was reconciled or rolled back.
    async fn after_settle(&self, _ctx: &MutationContext, _resolution: Resolution) {}
}
