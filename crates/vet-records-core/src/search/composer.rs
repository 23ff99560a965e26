//! Query composition for patient search.

use std::collections::HashMap;

use tracing::debug;

use super::{SearchFilters, SearchResult};
use crate::models::{Owner, Patient, Table};
use crate::store::{from_record, Predicate, TableQuery, TableStore};

/// Compose the read request for a search.
///
/// The query text is trimmed; blank text adds no constraint. All
/// constraints are conjunctive.
pub fn compose_patient_query(query: &str, filters: &SearchFilters) -> TableQuery {
    let mut request = TableQuery::from(Patient::NAME).join_one(Owner::NAME, "owner_id");

    let text = query.trim();
    if !text.is_empty() {
        request = request.filter(Predicate::any(vec![
            Predicate::contains("name", text),
            Predicate::contains("breed", text),
        ]));
    }

    if let Some(species) = &filters.species {
        request = request.filter(Predicate::eq("species", species.as_str()));
    }
    if let Some(breed) = &filters.breed {
        request = request.filter(Predicate::contains("breed", breed.as_str()));
    }
    if let Some(bracket) = filters.age {
        let (min, max) = bracket.range();
        request = request
            .filter(Predicate::gte("age", min))
            .filter(Predicate::lt("age", max));
    }

    request
}

/// Run one search against the store.
pub async fn search_patients(
    store: &dyn TableStore,
    query: &str,
    filters: &SearchFilters,
) -> SearchResult<Vec<Patient>> {
    let request = compose_patient_query(query, filters);
    debug!(?request, "searching patients");

    let rows = store.query(&request).await?;
    let patients = rows
        .into_iter()
        .map(from_record)
        .collect::<Result<Vec<Patient>, _>>()?;

    debug!(count = patients.len(), "search returned");
    Ok(patients)
}

/// [`search_patients`] with string-keyed filter selections.
pub async fn search_patients_by_map(
    store: &dyn TableStore,
    query: &str,
    selections: &HashMap<String, String>,
) -> SearchResult<Vec<Patient>> {
    let filters = SearchFilters::from_map(selections)?;
    search_patients(store, query, &filters).await
}
