//! Form-to-Mutation Adapter.
//!
//! Forms hold raw text the way the user typed it (plus `bool` toggles).
//! [`EntityForm::to_record`] validates every field and builds the typed
//! record; [`FormSubmitter`] then picks `create` or `update`.
//!
//! Validation never stops at the first bad field: all errors are collected
//! into [`FormErrors`] so each one can be shown next to its input.

mod entities;
pub mod fields;
mod submitter;

use std::fmt;

use thiserror::Error;

use crate::mutation::MutationError;
use crate::record::Record;

pub use entities::{
    FaqForm, ProductForm, ProjectForm, ServiceForm, SettingForm, SpecialServiceForm,
    WebApplicationForm, WebsiteProjectForm,
};
pub use fields::{join_list, parse_decimal, parse_int, parse_json, require, split_list};
pub use submitter::FormSubmitter;

/// A problem with one form field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("{field} is not valid JSON: {reason}")]
    InvalidJson { field: &'static str, reason: String },
    #[error("{field}: {input:?} is not a valid number")]
    InvalidNumber { field: &'static str, input: String },
    #[error("{field}: {input} is out of range")]
    OutOfRange { field: &'static str, input: String },
}

impl FieldError {
    pub fn field(&self) -> &'static str {
        match self {
            FieldError::Required(field) => *field,
            FieldError::InvalidJson { field, .. }
            | FieldError::InvalidNumber { field, .. }
            | FieldError::OutOfRange { field, .. } => *field,
        }
    }
}

/// Every field error of one submission, in form field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors(Vec<FieldError>);

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Error for `field`, for inline display.
    pub fn get(&self, field: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.field() == field)
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for FormErrors {}

/// Collects field errors while a form is being converted.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the value, or remember the error and return `None`.
    pub fn check<T>(&mut self, result: Result<T, FieldError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.errors.push(error);
                None
            }
        }
    }

    pub fn finish(self) -> Result<(), FormErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(FormErrors(self.errors))
        }
    }
}

/// Raw form state for one record type.
pub trait EntityForm: Send + Sync {
    type Record: Record;

    /// Pre-fill the form for editing `record`.
    fn from_record(record: &Self::Record) -> Self
    where
        Self: Sized;

    /// Validate and build the record. `id` is the edited record's id, if any.
    fn to_record(&self, id: Option<&str>) -> Result<Self::Record, FormErrors>;
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("invalid form: {0}")]
    Invalid(#[from] FormErrors),
    /// A mutation for this entity type is still running.
    #[error("a submission is already in flight")]
    Busy,
    #[error(transparent)]
    Mutation(#[from] MutationError),
}
