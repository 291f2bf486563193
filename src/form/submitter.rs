use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::{EntityForm, SubmitError};
use crate::collection::ManagedCollection;
use crate::record::Record;

/// Clears the submitting flag however the submission ends.
struct Submitting<'a>(&'a AtomicBool);

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Submits forms of type `F` to their managed collection.
///
/// Creates a new record unless [`FormSubmitter::edit`] selected an existing
/// one. Refuses to submit while any mutation on the collection is in flight.
pub struct FormSubmitter<F: EntityForm> {
    collection: ManagedCollection<F::Record>,
    editing: Mutex<Option<F::Record>>,
    submitting: AtomicBool,
}

impl<F: EntityForm> FormSubmitter<F> {
    pub fn new(collection: ManagedCollection<F::Record>) -> Self {
        Self {
            collection,
            editing: Mutex::new(None),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn collection(&self) -> &ManagedCollection<F::Record> {
        &self.collection
    }

    /// Start editing `record`; returns the pre-filled form.
    pub fn edit(&self, record: &F::Record) -> F {
        *self.editing.lock().unwrap_or_else(PoisonError::into_inner) = Some(record.clone());
        F::from_record(record)
    }

    pub fn cancel_edit(&self) {
        *self.editing.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn editing(&self) -> Option<F::Record> {
        self.editing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True while the submit button should be disabled.
    pub fn is_busy(&self) -> bool {
        self.submitting.load(Ordering::Acquire) || self.collection.is_mutating()
    }

    /// Validate `form` and run the matching mutation.
    pub async fn submit(&self, form: &F) -> Result<F::Record, SubmitError> {
        let existing = self.editing();
        let record = form.to_record(existing.as_ref().map(|r| r.id()))?;

        if self.collection.is_mutating()
            || self
                .submitting
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Err(SubmitError::Busy);
        }
        let _submitting = Submitting(&self.submitting);

        let result = match existing {
            Some(previous) => {
                debug!(table = <F::Record as Record>::TABLE, id = previous.id(), "submitting edit");
                self.collection.update(record).await
            }
            None => {
                debug!(table = <F::Record as Record>::TABLE, "submitting new record");
                self.collection.create(record).await
            }
        };

        let saved = result?;
        self.cancel_edit();
        Ok(saved)
    }
}
