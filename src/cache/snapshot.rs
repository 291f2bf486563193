use std::sync::Arc;

use super::CollectionKey;

/// Immutable copy of one collection's cached state, taken right before an
/// optimistic patch and used only to roll it back.
///
/// `records() == None` means nothing was cached under the key; restoring
/// such a snapshot removes the data again.
#[derive(Debug)]
pub struct Snapshot<R> {
    key: CollectionKey,
    data: Option<Arc<Vec<R>>>,
}

impl<R> Snapshot<R> {
    pub(crate) fn new(key: CollectionKey, data: Option<Arc<Vec<R>>>) -> Self {
        Self { key, data }
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    pub fn records(&self) -> Option<&[R]> {
        self.data.as_deref().map(Vec::as_slice)
    }

    pub(crate) fn into_data(self) -> Option<Arc<Vec<R>>> {
        self.data
    }
}

impl<R> Clone for Snapshot<R> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            data: self.data.clone(),
        }
    }
}
