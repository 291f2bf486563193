use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix that marks an identifier as local-only.
pub const TEMP_ID_PREFIX: &str = "tmp-";

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(1);

/// Generator for temporary identifiers of optimistically created records.
///
/// Ids are `tmp-<n>` with `n` increasing for the lifetime of the process, so
/// two optimistic records never share an id and none collides with a
/// backend-assigned id.
pub struct TempId;

impl TempId {
    pub fn next() -> String {
        let n = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", TEMP_ID_PREFIX, n)
    }
}

/// Returns true if `id` was produced by [`TempId::next`].
pub fn is_temporary(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}
