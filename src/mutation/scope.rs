use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifetime token of the component that started a mutation.
///
/// Once disposed, mutations that settle afterwards still keep the cache
/// consistent but skip UI-facing effects such as notifications.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    disposed: Arc<AtomicBool>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// A guard that disposes the scope when dropped.
    pub fn guard(&self) -> ScopeGuard {
        ScopeGuard(self.clone())
    }
}

/// Disposes its [`Scope`] on drop.
#[derive(Debug)]
pub struct ScopeGuard(Scope);

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.0.dispose();
    }
}
