//! Optimistic, cache-backed data synchronization for The Black Card admin panel.
//!
//! Reads go through a shared [`QueryCache`]; writes go through a
//! [`MutationRunner`] that applies them to the cache first, serializes them
//! per collection, and rolls back or reconciles once the backend answers.
//! [`ManagedCollection`] bundles both for one table, [`FormSubmitter`] turns
//! validated form input into those mutations, and [`AdminPanel`] wires the
//! whole thing from a [`SyncConfig`].

// Lets the `Record` derive refer to `::blackcard_sync` from inside this crate.
extern crate self as blackcard_sync;

pub mod activity;
pub mod backend;
pub mod cache;
pub mod collection;
pub mod config;
pub mod entities;
pub mod form;
pub mod leads;
pub mod media;
pub mod mutation;
pub mod notify;
pub mod panel;
pub mod realtime;
pub mod record;
pub mod telemetry;

pub use activity::ActivityLogger;
pub use backend::{
    Auth, Backend, BackendError, ChangeEvent, ChangeFeed, ChangeKind, FileStore, Filter,
    InMemoryBackend, Order, Query, Session,
};
#[cfg(feature = "http")]
pub use backend::RestBackend;
pub use cache::{CacheError, CollectionKey, Observer, QueryCache, QueryState, Snapshot};
pub use collection::ManagedCollection;
pub use config::{ConfigError, SyncConfig};
pub use form::{EntityForm, FieldError, FormErrors, FormSubmitter, SubmitError};
pub use mutation::{
    MutationContext, MutationError, MutationKind, MutationObserver, MutationRunner,
    OptimisticMutation, Outcome, Resolution, RollbackPolicy, Scope,
};
pub use notify::{LogNotifier, Notification, Notifier, NotifyObserver};
#[cfg(feature = "emitter")]
pub use notify::EmitterNotifier;
pub use panel::AdminPanel;
pub use realtime::{ContactCounter, RealtimeError, Subscription};
pub use record::{Record, RecordError, Row};

pub use blackcard_sync_macros::Record;

#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
