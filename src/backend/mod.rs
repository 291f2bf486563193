//! Backend - the hosted backend-as-a-service the admin panel talks to.
//!
//! The backend is an external collaborator. This module only describes what
//! the rest of the crate needs from it:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Backend     select / insert / update / delete on JSON rows   │
//! │ ChangeFeed  subscribe(table) -> ChangeStream                 │
//! │ FileStore   upload / public_url                              │
//! │ Auth        sign_in / sign_up / session / sign_out           │
//! └──────────────────────────────────────────────────────────────┘
//!          │                               │
//!          ▼                               ▼
//!   ┌───────────────┐              ┌────────────────────┐
//!   │InMemoryBackend│              │ RestBackend (http) │
//!   │ (included)    │              │ PostgREST-style    │
//!   └───────────────┘              └────────────────────┘
//! ```

mod change;
mod in_memory;
mod query;
#[cfg(feature = "http")]
mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::Row;

pub use change::{ChangeEvent, ChangeKind, ChangeStream, FeedError};
pub use in_memory::{InMemoryBackend, Operation};
pub use query::{Condition, Filter, Op, Order, Query};
#[cfg(feature = "http")]
pub use rest::RestBackend;

/// Error returned by any backend call.
///
/// All variants are treated the same by the mutation runner: the optimistic
/// change is rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    /// Constraint violation or validation rejected by the backend.
    #[error("rejected by backend: {0}")]
    Rejected(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// The backend answered with something that is not a valid row.
    #[error("invalid payload: {0}")]
    Payload(String),
    #[error("backend storage error: {0}")]
    Storage(String),
}

/// Row-based CRUD on named tables.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, BackendError>;

    /// Insert a row and return it as stored (with its backend-assigned id).
    async fn insert(&self, table: &str, row: Row) -> Result<Row, BackendError>;

    /// Merge `patch` into every matching row. Returns the number of rows affected.
    async fn update(&self, table: &str, patch: Row, filter: &Filter) -> Result<u64, BackendError>;

    /// Remove every matching row. Returns the number of rows affected.
    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, BackendError>;
}

/// Insert/update/delete notifications per table.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, table: &str) -> Result<ChangeStream, BackendError>;
}

/// Object storage for uploaded media.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store `bytes` at `path` inside `bucket`. Returns the stored path.
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>)
        -> Result<String, BackendError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Authenticated session returned by [`Auth`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub access_token: String,
}

/// Credential-pair authentication.
#[async_trait]
pub trait Auth: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, BackendError>;
    async fn session(&self) -> Option<Session>;
    async fn sign_out(&self) -> Result<(), BackendError>;
}
