//! Patient search: filter model, query composition and the debounced
//! input controller.
//!
//! ```text
//! keystrokes ──(300 ms quiet)──┐
//!                              ├──► compose_patient_query ──► TableStore::query
//! filter changes ──(now)───────┘                                  │
//!                                        latest sequence only ◄───┘
//! ```

mod composer;
mod controller;
mod filters;

pub use composer::*;
pub use controller::*;
pub use filters::*;

use thiserror::Error;

use crate::store::RemoteQueryError;

/// Search errors.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Unknown option for a known filter. Indicates a bad filter configuration.
    #[error("Invalid value {value:?} for filter {filter}")]
    InvalidFilterValue { filter: &'static str, value: String },

    #[error("Unknown filter: {0:?}")]
    UnknownFilter(String),

    #[error("Remote query failed: {0}")]
    RemoteQuery(#[from] RemoteQueryError),

    #[error("Search controller has shut down")]
    ControllerClosed,
}

pub type SearchResult<T> = Result<T, SearchError>;
