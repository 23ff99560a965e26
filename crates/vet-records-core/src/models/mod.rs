//! Domain models for the veterinary records client.

mod medical_record;
mod owner;
mod patient;

pub use medical_record::*;
pub use owner::*;
pub use patient::*;

/// A domain type persisted in a named table of the table store.
pub trait Table {
    /// Table name in the store.
    const NAME: &'static str;
}

/// Text shown wherever a patient has no linked owner.
pub const NO_OWNER_LABEL: &str = "Nenhum tutor cadastrado";

/// Reads a nullable field of a partial update: absent is `None`, `null` is `Some(None)`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}
