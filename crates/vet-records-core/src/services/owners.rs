//! Owner service.

use super::{delete, fetch_all, fetch_single, insert, update};
use crate::models::{NewOwner, Owner, OwnerChanges, Patient, Table};
use crate::store::{StoreResult, TableQuery, TableStore};

fn owners_with_patients() -> TableQuery {
    TableQuery::from(Owner::NAME).join_many(Patient::NAME, "owner_id")
}

/// All owners with their patients.
pub async fn list_owners(store: &dyn TableStore) -> StoreResult<Vec<Owner>> {
    fetch_all(store, &owners_with_patients()).await
}

pub async fn get_owner(store: &dyn TableStore, id: &str) -> StoreResult<Option<Owner>> {
    fetch_single(store, &owners_with_patients().by_id(id)).await
}

pub async fn create_owner(store: &dyn TableStore, owner: &NewOwner) -> StoreResult<Owner> {
    insert(store, owner).await
}

pub async fn update_owner(
    store: &dyn TableStore,
    id: &str,
    changes: &OwnerChanges,
) -> StoreResult<Owner> {
    update(store, id, changes).await
}

/// Delete an owner. Their patients are kept, unlinked.
pub async fn delete_owner(store: &dyn TableStore, id: &str) -> StoreResult<()> {
    delete::<Owner>(store, id).await
}
