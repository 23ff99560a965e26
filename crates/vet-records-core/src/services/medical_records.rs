//! Medical record service.

use super::{delete, fetch_all, fetch_single, insert, update};
use crate::models::{MedicalRecord, MedicalRecordChanges, NewMedicalRecord, Table};
use crate::store::{Predicate, StoreResult, TableQuery, TableStore};

/// Timeline of a patient, most recent first.
pub async fn list_medical_records(
    store: &dyn TableStore,
    patient_id: &str,
) -> StoreResult<Vec<MedicalRecord>> {
    let query = TableQuery::from(MedicalRecord::NAME)
        .filter(Predicate::eq("patient_id", patient_id))
        .order_by("date", false);
    fetch_all(store, &query).await
}

pub async fn get_medical_record(
    store: &dyn TableStore,
    id: &str,
) -> StoreResult<Option<MedicalRecord>> {
    fetch_single(store, &TableQuery::from(MedicalRecord::NAME).by_id(id)).await
}

pub async fn create_medical_record(
    store: &dyn TableStore,
    record: &NewMedicalRecord,
) -> StoreResult<MedicalRecord> {
    insert(store, record).await
}

pub async fn update_medical_record(
    store: &dyn TableStore,
    id: &str,
    changes: &MedicalRecordChanges,
) -> StoreResult<MedicalRecord> {
    update(store, id, changes).await
}

pub async fn delete_medical_record(store: &dyn TableStore, id: &str) -> StoreResult<()> {
    delete::<MedicalRecord>(store, id).await
}
