//! Typed CRUD over the table and blob stores.
//!
//! Each service is a thin pass-through: compose the request, run it once,
//! decode the rows. Callers own error reporting.

mod medical_records;
mod owners;
mod patients;
mod photos;

pub use medical_records::*;
pub use owners::*;
pub use patients::*;
pub use photos::*;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::models::Table;
use crate::store::{from_record, to_record, StoreResult, TableQuery, TableStore};

async fn fetch_all<T>(store: &dyn TableStore, query: &TableQuery) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned,
{
    store
        .query(query)
        .await?
        .into_iter()
        .map(from_record)
        .collect()
}

async fn fetch_single<T>(store: &dyn TableStore, query: &TableQuery) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
{
    let rows = store.query(query).await?;
    rows.into_iter().next().map(from_record).transpose()
}

async fn insert<T, F>(store: &dyn TableStore, fields: &F) -> StoreResult<T>
where
    T: Table + DeserializeOwned,
    F: Serialize,
{
    let row = store.insert(T::NAME, to_record(fields)?).await?;
    let created = from_record(row)?;
    info!(table = T::NAME, "row created");
    Ok(created)
}

async fn update<T, F>(store: &dyn TableStore, id: &str, changes: &F) -> StoreResult<T>
where
    T: Table + DeserializeOwned,
    F: Serialize,
{
    let row = store.update(T::NAME, id, to_record(changes)?).await?;
    let updated = from_record(row)?;
    info!(table = T::NAME, id, "row updated");
    Ok(updated)
}

async fn delete<T: Table>(store: &dyn TableStore, id: &str) -> StoreResult<()> {
    store.delete(T::NAME, id).await?;
    info!(table = T::NAME, id, "row deleted");
    Ok(())
}
