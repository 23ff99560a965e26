//! Form state, validation and submission.
//!
//! A form holds raw text as typed. `validate` turns it into typed fields
//! without touching the network; `submit` validates, performs exactly one
//! create (no id) or update (id present), and reports the outcome as a
//! notification.

mod medical_record;
mod owner;
mod patient;

pub use medical_record::*;
pub use owner::*;
pub use patient::*;

use thiserror::Error;
use tracing::{error, warn};

use crate::notify::{Notification, Notifier};
use crate::search::SearchHandle;
use crate::services::PhotoError;
use crate::store::{RemoteQueryError, StoreResult, TableStore};

/// Field-level validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field is empty: {0}")]
    Required(&'static str),

    #[error("Field {field} must be a non-negative number, got {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Field {field} must be a date (YYYY-MM-DD), got {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("Field {field} has an unknown option {value:?}")]
    InvalidChoice { field: &'static str, value: String },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Submission errors.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Remote(#[from] RemoteQueryError),

    #[error("Photo error: {0}")]
    Photo(#[from] PhotoError),
}

pub type SubmitResult<T> = Result<T, SubmitError>;

/// Collaborators of a submission.
#[derive(Clone, Copy)]
pub struct FormContext<'a> {
    pub store: &'a dyn TableStore,
    pub notifier: &'a dyn Notifier,
    /// Search list to refresh after a successful save
    pub search: Option<&'a SearchHandle>,
}

impl<'a> FormContext<'a> {
    pub fn new(store: &'a dyn TableStore, notifier: &'a dyn Notifier) -> Self {
        Self {
            store,
            notifier,
            search: None,
        }
    }

    pub fn with_search(mut self, search: &'a SearchHandle) -> Self {
        self.search = Some(search);
        self
    }

    /// Report the outcome of a save.
    fn finish<T>(&self, result: StoreResult<T>, saved: &str, failed: &str) -> SubmitResult<T> {
        match result {
            Ok(value) => {
                self.notifier.notify(Notification::success(saved));
                if let Some(search) = self.search {
                    if let Err(err) = search.refresh() {
                        warn!(error = %err, "could not refresh search after save");
                    }
                }
                Ok(value)
            }
            Err(err) => {
                error!(error = %err, "save failed");
                self.notifier.notify(Notification::error(failed));
                Err(err.into())
            }
        }
    }
}

/// Trimmed value of a required field.
fn required(field: &'static str, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(value.to_string())
}

/// Parse a required non-negative number. Accepts `,` as decimal separator.
fn parse_non_negative(field: &'static str, value: &str) -> ValidationResult<f64> {
    let text = required(field, value)?;
    match text.replace(',', ".").parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => Ok(n),
        _ => Err(ValidationError::InvalidNumber { field, value: text }),
    }
}

/// Blank means "not set".
fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
