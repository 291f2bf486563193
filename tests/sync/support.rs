use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blackcard_sync::backend::Query;
use blackcard_sync::notify::{Level, LogNotifier, Notification};
use blackcard_sync::{AdminPanel, Backend, BackendError, Filter, InMemoryBackend, Row, SyncConfig};

/// Backend whose inserts are assigned a fixed id, like a real server would.
pub struct AssigningBackend {
    pub inner: InMemoryBackend,
    pub next_id: &'static str,
}

#[async_trait]
impl Backend for AssigningBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, BackendError> {
        self.inner.select(table, query).await
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row, BackendError> {
        row.insert("id".into(), self.next_id.into());
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, patch: Row, filter: &Filter) -> Result<u64, BackendError> {
        self.inner.update(table, patch, filter).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, BackendError> {
        self.inner.delete(table, filter).await
    }
}

pub type Toasts = Arc<Mutex<Vec<Notification>>>;

pub fn panel_over(backend: Arc<dyn Backend>) -> (AdminPanel, Toasts) {
    blackcard_sync::telemetry::init_for_tests();
    let toasts = Arc::new(Mutex::new(Vec::new()));
    let panel = AdminPanel::builder(SyncConfig::default(), backend)
        .notifier(Arc::new(LogNotifier::with_buffer(Arc::clone(&toasts))))
        .activity_log(false)
        .build();
    (panel, toasts)
}

pub fn panel(backend: &InMemoryBackend) -> (AdminPanel, Toasts) {
    panel_over(Arc::new(backend.clone()))
}

pub fn count(toasts: &Toasts, level: Level) -> usize {
    toasts
        .lock()
        .unwrap()
        .iter()
        .filter(|n| n.level == level)
        .count()
}
