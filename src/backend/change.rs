//! Table change notifications.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::record::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row change on a named table. For deletes `row` is the removed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub row: Row,
}

impl ChangeEvent {
    pub fn row_id(&self) -> Option<&str> {
        self.row.get("id").and_then(|v| v.as_str())
    }
}

/// Why a change stream could not yield the next event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The listener fell behind and `0` notifications were dropped.
    #[error("change feed lagged, {0} notifications missed")]
    Lagged(u64),
    #[error("change feed closed")]
    Closed,
}

/// Receiving end of a table subscription.
///
/// Delivery is at-least-once and may lag; a lag is reported instead of
/// silently skipping so listeners can fall back to a full refetch.
pub struct ChangeStream {
    rx: broadcast::Receiver<ChangeEvent>,
}

impl ChangeStream {
    pub fn new(rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Result<ChangeEvent, FeedError> {
        match self.rx.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(FeedError::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => Err(FeedError::Closed),
        }
    }
}
