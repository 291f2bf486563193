use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::CollectionKey;

/// Per-key FIFO queue for mutations.
///
/// Lazily creates one async mutex per collection key and returns the same
/// `Arc` for repeated lookups. `tokio::sync::Mutex` grants the lock in the
/// order it was requested, so mutations on one key settle in issue order.
/// Different keys never wait on each other.
#[derive(Default)]
pub struct KeyedQueue {
    slots: Mutex<HashMap<CollectionKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &CollectionKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for this key's turn. The slot is released when the guard drops.
    pub async fn acquire(&self, key: &CollectionKey) -> OwnedMutexGuard<()> {
        self.slot(key).lock_owned().await
    }

    /// True while a mutation holds (or waits for) the slot of `key`.
    pub fn is_busy(&self, key: &CollectionKey) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(key)
            .is_some_and(|slot| slot.try_lock().is_err())
    }
}
