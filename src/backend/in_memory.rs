//! InMemoryBackend - HashMap-backed backend for testing and development.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::broadcast;

use super::{
    Auth, Backend, BackendError, ChangeEvent, ChangeFeed, ChangeKind, ChangeStream, FileStore,
    Filter, Query, Session,
};
use crate::record::{self, Record, Row};

const FEED_CAPACITY: usize = 256;

/// Backend operation, used for fault injection and call inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Upload,
}

struct Fault {
    op: Operation,
    table: String,
    error: BackendError,
}

struct Account {
    user_id: String,
    password: String,
}

struct Inner {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    feeds: Mutex<HashMap<String, broadcast::Sender<ChangeEvent>>>,
    objects: RwLock<HashMap<String, Vec<u8>>>,
    accounts: RwLock<HashMap<String, Account>>,
    session: RwLock<Option<Session>>,
    faults: Mutex<VecDeque<Fault>>,
    latency: RwLock<Option<Duration>>,
    calls: Mutex<Vec<(Operation, String)>>,
}

/// In-memory implementation of every backend trait.
///
/// Features:
/// - Rows get a uuid `id` and an RFC 3339 `created_at` on insert
/// - Rows are kept in insertion order
/// - Every insert/update/delete is broadcast to table subscribers
/// - One-shot fault injection via [`InMemoryBackend::fail_next`]
/// - Optional artificial latency for concurrency tests
///
/// Clone-friendly via Arc: clones share the same storage.
///
/// ## Example
///
/// ```
/// use blackcard_sync::backend::{Backend, BackendError, InMemoryBackend, Operation, Query};
///
/// # tokio_test_block_on(async {
/// let backend = InMemoryBackend::new();
/// backend.fail_next(Operation::Insert, "faqs", BackendError::Timeout);
///
/// let row = serde_json::json!({ "question": "Q", "answer": "A" });
/// let err = backend.insert("faqs", row.as_object().unwrap().clone()).await;
/// assert_eq!(err, Err(BackendError::Timeout));
/// assert!(backend.select("faqs", &Query::all()).await.unwrap().is_empty());
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    inner: Arc<Inner>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(HashMap::new()),
                feeds: Mutex::new(HashMap::new()),
                objects: RwLock::new(HashMap::new()),
                accounts: RwLock::new(HashMap::new()),
                session: RwLock::new(None),
                faults: Mutex::new(VecDeque::new()),
                latency: RwLock::new(None),
                calls: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make every call sleep for `latency` before touching storage.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(Some(latency));
        self
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self
            .inner
            .latency
            .write()
            .unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Fail the next `op` on `table` with `error`. Faults queue up in order.
    pub fn fail_next(&self, op: Operation, table: &str, error: BackendError) {
        self.inner
            .faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Fault {
                op,
                table: table.to_string(),
                error,
            });
    }

    /// Store records as-is, without notifications, faults or latency.
    pub fn seed<R: Record>(&self, records: &[R]) -> Result<(), BackendError> {
        let mut rows = Vec::with_capacity(records.len());
        for r in records {
            rows.push(record::to_row(r).map_err(|e| BackendError::Payload(e.to_string()))?);
        }
        self.seed_rows(R::TABLE, rows)
    }

    pub fn seed_rows(&self, table: &str, rows: Vec<Row>) -> Result<(), BackendError> {
        let mut tables = self.tables_write()?;
        let stored = tables.entry(table.to_string()).or_default();
        for row in rows {
            stored.push(Self::stamp(row));
        }
        Ok(())
    }

    /// Current rows of `table`, in storage order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Current rows of `R::TABLE`, decoded. Rows that fail to decode are skipped.
    pub fn records<R: Record>(&self) -> Vec<R> {
        self.rows(R::TABLE)
            .into_iter()
            .filter_map(|row| record::from_row(row).ok())
            .collect()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(Operation, String)> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self, op: Operation, table: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(o, t)| *o == op && t == table)
            .count()
    }

    /// Drop the notification channel of `table`; open streams observe `Closed`.
    pub fn close_feed(&self, table: &str) {
        self.inner
            .feeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(table);
    }

    /// Stored bytes of an uploaded object.
    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.inner
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&Self::object_key(bucket, path))
            .cloned()
    }

    async fn enter(&self, op: Operation, table: &str) -> Result<(), BackendError> {
        self.inner
            .calls
            .lock()
            .map_err(|_| BackendError::Storage("call log poisoned".into()))?
            .push((op, table.to_string()));

        let latency = *self
            .inner
            .latency
            .read()
            .map_err(|_| BackendError::Storage("latency lock poisoned".into()))?;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut faults = self
            .inner
            .faults
            .lock()
            .map_err(|_| BackendError::Storage("fault queue poisoned".into()))?;
        if let Some(pos) = faults.iter().position(|f| f.op == op && f.table == table) {
            if let Some(fault) = faults.remove(pos) {
                return Err(fault.error);
            }
        }
        Ok(())
    }

    fn publish(&self, table: &str, kind: ChangeKind, row: Row) {
        let feeds = self
            .inner
            .feeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = feeds.get(table) {
            // No receivers is fine.
            let _ = tx.send(ChangeEvent {
                table: table.to_string(),
                kind,
                row,
            });
        }
    }

    fn tables_write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<Row>>>, BackendError> {
        self.inner
            .tables
            .write()
            .map_err(|_| BackendError::Storage("lock poisoned".into()))
    }

    fn stamp(mut row: Row) -> Row {
        let has_id = matches!(row.get("id"), Some(Value::String(s)) if !s.is_empty());
        if !has_id {
            row.insert(
                "id".into(),
                Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
        if !row.contains_key("created_at") {
            row.insert(
                "created_at".into(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }
        row
    }

    fn object_key(bucket: &str, path: &str) -> String {
        format!("{}/{}", bucket, path)
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>, BackendError> {
        self.enter(Operation::Select, table).await?;
        let tables = self
            .inner
            .tables
            .read()
            .map_err(|_| BackendError::Storage("lock poisoned".into()))?;
        Ok(tables
            .get(table)
            .map(|rows| query.apply(rows))
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, BackendError> {
        self.enter(Operation::Insert, table).await?;
        let row = Self::stamp(row);
        {
            let mut tables = self.tables_write()?;
            let stored = tables.entry(table.to_string()).or_default();
            if stored.iter().any(|existing| existing.get("id") == row.get("id")) {
                return Err(BackendError::Rejected(format!(
                    "duplicate key value violates unique constraint on {}.id",
                    table
                )));
            }
            stored.push(row.clone());
        }
        self.publish(table, ChangeKind::Insert, row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, patch: Row, filter: &Filter) -> Result<u64, BackendError> {
        self.enter(Operation::Update, table).await?;
        let mut changed = Vec::new();
        {
            let mut tables = self.tables_write()?;
            if let Some(rows) = tables.get_mut(table) {
                for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                    for (column, value) in &patch {
                        row.insert(column.clone(), value.clone());
                    }
                    changed.push(row.clone());
                }
            }
        }
        let count = changed.len() as u64;
        for row in changed {
            self.publish(table, ChangeKind::Update, row);
        }
        Ok(count)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<u64, BackendError> {
        self.enter(Operation::Delete, table).await?;
        let mut removed = Vec::new();
        {
            let mut tables = self.tables_write()?;
            if let Some(rows) = tables.get_mut(table) {
                let (gone, kept): (Vec<Row>, Vec<Row>) =
                    rows.drain(..).partition(|row| filter.matches(row));
                *rows = kept;
                removed = gone;
            }
        }
        let count = removed.len() as u64;
        for row in removed {
            self.publish(table, ChangeKind::Delete, row);
        }
        Ok(count)
    }
}

impl ChangeFeed for InMemoryBackend {
    fn subscribe(&self, table: &str) -> Result<ChangeStream, BackendError> {
        let mut feeds = self
            .inner
            .feeds
            .lock()
            .map_err(|_| BackendError::Storage("feed registry poisoned".into()))?;
        let tx = feeds
            .entry(table.to_string())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0);
        Ok(ChangeStream::new(tx.subscribe()))
    }
}

#[async_trait]
impl FileStore for InMemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BackendError> {
        self.enter(Operation::Upload, bucket).await?;
        let mut objects = self
            .inner
            .objects
            .write()
            .map_err(|_| BackendError::Storage("lock poisoned".into()))?;
        let key = Self::object_key(bucket, path);
        if objects.contains_key(&key) {
            return Err(BackendError::Rejected(format!("object {} already exists", key)));
        }
        objects.insert(key, bytes);
        Ok(path.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://storage/{}/{}", bucket, path)
    }
}

#[async_trait]
impl Auth for InMemoryBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let user_id = {
            let accounts = self
                .inner
                .accounts
                .read()
                .map_err(|_| BackendError::Storage("lock poisoned".into()))?;
            match accounts.get(email) {
                Some(account) if account.password == password => account.user_id.clone(),
                _ => {
                    return Err(BackendError::Unauthorized(
                        "invalid login credentials".into(),
                    ))
                }
            }
        };
        let session = Session {
            user_id,
            email: email.to_string(),
            access_token: uuid::Uuid::new_v4().to_string(),
        };
        *self
            .inner
            .session
            .write()
            .map_err(|_| BackendError::Storage("lock poisoned".into()))? = Some(session.clone());
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        {
            let mut accounts = self
                .inner
                .accounts
                .write()
                .map_err(|_| BackendError::Storage("lock poisoned".into()))?;
            if accounts.contains_key(email) {
                return Err(BackendError::Rejected("user already registered".into()));
            }
            accounts.insert(
                email.to_string(),
                Account {
                    user_id: uuid::Uuid::new_v4().to_string(),
                    password: password.to_string(),
                },
            );
        }
        self.sign_in(email, password).await
    }

    async fn session(&self) -> Option<Session> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        *self
            .inner
            .session
            .write()
            .map_err(|_| BackendError::Storage("lock poisoned".into()))? = None;
        Ok(())
    }
}
