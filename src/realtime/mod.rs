//! Realtime - keep cached collections current from the change feed.
//!
//! Every listener is a [`Subscription`]: a disposable handle around a
//! spawned task. Change notifications only invalidate cache keys; the cache
//! refetches what is observed, so a missed or duplicated notification is
//! harmless.
//!
//! Channel failures are logged and never propagated. When the feed is
//! unavailable, [`poll_every`] is the fallback.

mod counter;
mod subscription;

use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::backend::{BackendError, ChangeFeed, FeedError};
use crate::cache::{CollectionKey, QueryCache};

pub use counter::ContactCounter;
pub use subscription::Subscription;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    #[error("failed to subscribe to {table}: {source}")]
    Subscribe {
        table: String,
        #[source]
        source: BackendError,
    },
    #[error("initial load failed: {0}")]
    Load(#[source] BackendError),
    #[error("no async runtime to run the listener on")]
    NoRuntime,
}

/// Invalidate `keys` whenever `table` changes.
///
/// A lagged stream invalidates all keys once. A closed stream ends the
/// listener with a warning.
pub fn watch_table(
    feed: &dyn ChangeFeed,
    table: &str,
    cache: QueryCache,
    keys: Vec<CollectionKey>,
) -> Result<Subscription, RealtimeError> {
    let mut stream = feed
        .subscribe(table)
        .map_err(|source| RealtimeError::Subscribe {
            table: table.to_string(),
            source,
        })?;
    let table = table.to_string();

    Subscription::spawn(format!("watch:{}", table), move |mut stop| async move {
        loop {
            tokio::select! {
                _ = &mut stop => break,
                next = stream.next() => match next {
                    Ok(event) => {
                        debug!(table = %table, kind = ?event.kind, id = ?event.row_id(), "change received");
                        for key in &keys {
                            cache.invalidate(key);
                        }
                    }
                    Err(FeedError::Lagged(missed)) => {
                        warn!(table = %table, missed, "change feed lagged, invalidating");
                        for key in &keys {
                            cache.invalidate(key);
                        }
                    }
                    Err(FeedError::Closed) => {
                        warn!(table = %table, "change feed closed");
                        break;
                    }
                },
            }
        }
    })
}

/// Invalidate `keys` every `interval`, starting one interval from now.
pub fn poll_every(
    cache: QueryCache,
    keys: Vec<CollectionKey>,
    interval: Duration,
) -> Result<Subscription, RealtimeError> {
    Subscription::spawn("poll", move |mut stop| async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    for key in &keys {
                        cache.invalidate(key);
                    }
                }
            }
        }
    })
}
