//! Patient service.

use super::{delete, fetch_all, fetch_single, insert, update};
use crate::models::{NewPatient, Owner, Patient, PatientChanges, Table};
use crate::store::{StoreResult, TableQuery, TableStore};

fn patients_with_owner() -> TableQuery {
    TableQuery::from(Patient::NAME).join_one(Owner::NAME, "owner_id")
}

/// All patients with their owners, in store order.
pub async fn list_patients(store: &dyn TableStore) -> StoreResult<Vec<Patient>> {
    fetch_all(store, &patients_with_owner()).await
}

/// A patient with its owner, or `None` if the id is unknown.
pub async fn get_patient(store: &dyn TableStore, id: &str) -> StoreResult<Option<Patient>> {
    fetch_single(store, &patients_with_owner().by_id(id)).await
}

pub async fn create_patient(store: &dyn TableStore, patient: &NewPatient) -> StoreResult<Patient> {
    insert(store, patient).await
}

/// Apply the present fields of `changes`.
pub async fn update_patient(
    store: &dyn TableStore,
    id: &str,
    changes: &PatientChanges,
) -> StoreResult<Patient> {
    update(store, id, changes).await
}

/// Delete a patient. Its medical records go with it.
pub async fn delete_patient(store: &dyn TableStore, id: &str) -> StoreResult<()> {
    delete::<Patient>(store, id).await
}
