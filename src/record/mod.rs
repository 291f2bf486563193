//! Records - typed rows of a backend table.
//!
//! Every business entity the admin panel manages (projects, products, FAQs, ...)
//! is a plain struct implementing [`Record`]. The backend speaks untyped JSON
//! rows; conversion happens here and nowhere else.
//!
//! ## Example
//!
//! ```ignore
//! use blackcard_sync::Record;
//!
//! #[derive(Clone, Serialize, Deserialize, Record)]
//! #[record(table = "faqs")]
//! struct Faq {
//!     #[record(id)]
//!     pub id: String,
//!     pub question: String,
//! }
//! ```

mod temp_id;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use temp_id::{is_temporary, TempId, TEMP_ID_PREFIX};

/// A JSON object as exchanged with the backend.
pub type Row = serde_json::Map<String, Value>;

/// A typed row of one backend table.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Backend table this record lives in (e.g. "projects", "faqs").
    const TABLE: &'static str;

    /// Name of the identifier column.
    const ID_FIELD: &'static str = "id";

    /// Columns the backend maintains on its own. Never sent on writes.
    const SERVER_FIELDS: &'static [&'static str] = &["created_at", "updated_at"];

    /// Returns the unique identifier of this record.
    fn id(&self) -> &str;

    /// Replaces the identifier (used to assign temporary ids to optimistic records).
    fn set_id(&mut self, id: String);

    /// True while the record only exists locally under a temporary id.
    fn is_temporary(&self) -> bool {
        is_temporary(self.id())
    }
}

/// Error converting between records and backend rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record serialization error for {table}: {message}")]
    Serde { table: &'static str, message: String },
    #[error("record for {0} did not serialize to a JSON object")]
    NotAnObject(&'static str),
}

/// Serialize a record into an insert payload.
///
/// The id column is dropped when it is empty or temporary so the backend
/// assigns the real identifier. Server-maintained columns and unset (null)
/// columns are dropped too, leaving them to the backend's defaults.
pub fn to_row<R: Record>(record: &R) -> Result<Row, RecordError> {
    let mut row = to_object(record)?;
    if record.id().is_empty() || record.is_temporary() {
        row.remove(R::ID_FIELD);
    }
    strip_server_fields::<R>(&mut row);
    row.retain(|_, value| !value.is_null());
    Ok(row)
}

/// Serialize a record into an update patch (everything except the id and server columns).
///
/// Unset optional columns are sent as explicit `null` so a patch can clear them.
pub fn to_patch<R: Record>(record: &R) -> Result<Row, RecordError> {
    let mut row = to_object(record)?;
    row.remove(R::ID_FIELD);
    strip_server_fields::<R>(&mut row);
    Ok(row)
}

/// Deserialize a backend row into a record.
pub fn from_row<R: Record>(row: Row) -> Result<R, RecordError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| RecordError::Serde {
        table: R::TABLE,
        message: e.to_string(),
    })
}

/// Deserialize a list of backend rows, failing on the first malformed one.
pub fn from_rows<R: Record>(rows: Vec<Row>) -> Result<Vec<R>, RecordError> {
    rows.into_iter().map(from_row).collect()
}

fn to_object<R: Record>(record: &R) -> Result<Row, RecordError> {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RecordError::NotAnObject(R::TABLE)),
        Err(e) => Err(RecordError::Serde {
            table: R::TABLE,
            message: e.to_string(),
        }),
    }
}

fn strip_server_fields<R: Record>(row: &mut Row) {
    for field in R::SERVER_FIELDS {
        row.remove(*field);
    }
}
