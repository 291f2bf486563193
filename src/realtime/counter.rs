use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::{RealtimeError, Subscription};
use crate::backend::{Backend, BackendError, ChangeFeed, ChangeKind, FeedError, Query};
use crate::entities::WhatsAppContact;
use crate::record::{Record, Row};

/// Live number of WhatsApp contact events.
///
/// Subscribes before the initial count so no insert can fall between the
/// two; events are de-duplicated by row id, so at-least-once delivery never
/// double counts.
pub struct ContactCounter {
    count: watch::Receiver<u64>,
    subscription: Subscription,
}

impl ContactCounter {
    pub async fn start(
        backend: Arc<dyn Backend>,
        feed: &dyn ChangeFeed,
    ) -> Result<Self, RealtimeError> {
        let table = WhatsAppContact::TABLE;
        let mut stream = feed
            .subscribe(table)
            .map_err(|source| RealtimeError::Subscribe {
                table: table.to_string(),
                source,
            })?;
        let mut seen = load_ids(backend.as_ref())
            .await
            .map_err(RealtimeError::Load)?;
        let (tx, count) = watch::channel(seen.len() as u64);

        let subscription = Subscription::spawn("contact-counter", move |mut stop| async move {
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    next = stream.next() => match next {
                        Ok(event) => {
                            let Some(id) = event.row_id().map(str::to_string) else {
                                continue;
                            };
                            let changed = match event.kind {
                                ChangeKind::Insert => seen.insert(id),
                                ChangeKind::Delete => seen.remove(&id),
                                ChangeKind::Update => false,
                            };
                            if changed {
                                debug!(count = seen.len(), "contact count changed");
                                tx.send_replace(seen.len() as u64);
                            }
                        }
                        Err(FeedError::Lagged(missed)) => {
                            warn!(missed, "contact feed lagged, recounting");
                            match load_ids(backend.as_ref()).await {
                                Ok(ids) => {
                                    seen = ids;
                                    tx.send_replace(seen.len() as u64);
                                }
                                Err(err) => warn!(error = %err, "recount failed, keeping last count"),
                            }
                        }
                        Err(FeedError::Closed) => {
                            warn!("contact feed closed, count is frozen");
                            break;
                        }
                    },
                }
            }
        })?;

        Ok(Self {
            count,
            subscription,
        })
    }

    pub fn count(&self) -> u64 {
        *self.count.borrow()
    }

    /// Wait for the next change. Returns false once the counter stopped.
    pub async fn changed(&mut self) -> bool {
        self.count.changed().await.is_ok()
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_active()
    }

    pub async fn dispose(self) {
        self.subscription.dispose().await;
    }
}

async fn load_ids(backend: &dyn Backend) -> Result<HashSet<String>, BackendError> {
    let rows = backend.select(WhatsAppContact::TABLE, &Query::all()).await?;
    Ok(rows.iter().filter_map(row_id).collect())
}

fn row_id(row: &Row) -> Option<String> {
    row.get(WhatsAppContact::ID_FIELD)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
