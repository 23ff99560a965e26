//! Table and blob store layer.
//!
//! The hosted backend exposes per-table filtered reads plus insert, update
//! and delete, with foreign-key eager loading. [`TableStore`] captures that
//! contract; [`RestTableStore`] talks to the hosted API and
//! [`SqliteTableStore`] implements the same contract over a local SQLite
//! file (development database and test double).

mod blob;
mod query;
mod rest;
mod schema;
mod sqlite;

pub use blob::*;
pub use query::*;
pub use rest::*;
pub use schema::*;
pub use sqlite::*;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A row as exchanged with the store: column name to JSON value.
pub type Record = serde_json::Map<String, Value>;

/// Errors from reads and writes against the table store.
#[derive(Error, Debug)]
pub enum RemoteQueryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Record not found: {table}/{id}")]
    NotFound { table: String, id: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

pub type StoreResult<T> = Result<T, RemoteQueryError>;

/// Remote table store contract.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Run a composed read request.
    async fn query(&self, query: &TableQuery) -> StoreResult<Vec<Record>>;

    /// Insert a row and return it as stored.
    async fn insert(&self, table: &str, fields: Record) -> StoreResult<Record>;

    /// Apply a partial update to the row with `id` and return it as stored.
    async fn update(&self, table: &str, id: &str, fields: Record) -> StoreResult<Record>;

    /// Delete the row with `id`. Deleting a missing row is not an error.
    async fn delete(&self, table: &str, id: &str) -> StoreResult<()>;
}

/// Serialize a typed value into a store record.
pub fn to_record<T: Serialize>(value: &T) -> StoreResult<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(RemoteQueryError::UnexpectedResponse(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Deserialize a store record into a typed value.
pub fn from_record<T: DeserializeOwned>(record: Record) -> StoreResult<T> {
    Ok(serde_json::from_value(Value::Object(record))?)
}

/// Reject anything that is not a plain `[A-Za-z0-9_]` identifier.
pub(crate) fn validate_identifier(name: &str) -> StoreResult<&str> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(RemoteQueryError::InvalidIdentifier(name.to_string()))
    }
}
