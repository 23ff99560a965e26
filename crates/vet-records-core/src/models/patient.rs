//! Patient models.

use serde::{Deserialize, Serialize};

use super::{Owner, Table, NO_OWNER_LABEL};
use crate::search::AgeBracket;

/// Biological sex of a patient.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

impl Sex {
    /// Wire value ("male" / "female").
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }

    /// Display label in the clinic locale.
    pub fn label(&self) -> &'static str {
        match self {
            Sex::Male => "Macho",
            Sex::Female => "Fêmea",
        }
    }

    /// Parse a wire value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "male" => Some(Sex::Male),
            "female" => Some(Sex::Female),
            _ => None,
        }
    }
}

/// A patient (pet) record as read from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Store-assigned identity
    pub id: String,
    /// Pet name
    pub name: String,
    /// Species option value (e.g., "dog", "cat", "bird", "other")
    pub species: String,
    /// Breed, free text
    pub breed: String,
    /// Age in years
    pub age: f64,
    /// Weight in kg
    pub weight: f64,
    pub sex: Sex,
    /// Public URL of the uploaded photo
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Owning client, optional at creation time
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    /// Eagerly joined owner row
    #[serde(default, rename = "owners", skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
}

impl Table for Patient {
    const NAME: &'static str = "patients";
}

impl Patient {
    /// Owner name, or the "no owner registered" label.
    pub fn owner_display(&self) -> &str {
        self.owner
            .as_ref()
            .map(|o| o.name.as_str())
            .unwrap_or(NO_OWNER_LABEL)
    }

    /// Age bracket this patient falls in, if any.
    pub fn age_bracket(&self) -> Option<AgeBracket> {
        AgeBracket::for_age(self.age)
    }

    /// "species • breed" summary line used by list cards.
    pub fn summary_line(&self) -> String {
        format!("{} • {}", self.species, self.breed)
    }
}

/// Fields for creating a patient. Identity and timestamps are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: f64,
    pub weight: f64,
    pub sex: Sex,
    pub photo_url: Option<String>,
    pub owner_id: Option<String>,
}

/// Partial update for a patient; only present fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatientChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    /// `Some(None)` clears the photo
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub photo_url: Option<Option<String>>,
    /// `Some(None)` unlinks the owner
    #[serde(
        default,
        deserialize_with = "super::nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub owner_id: Option<Option<String>>,
}

impl From<NewPatient> for PatientChanges {
    fn from(patient: NewPatient) -> Self {
        Self {
            name: Some(patient.name),
            species: Some(patient.species),
            breed: Some(patient.breed),
            age: Some(patient.age),
            weight: Some(patient.weight),
            sex: Some(patient.sex),
            photo_url: Some(patient.photo_url),
            owner_id: Some(patient.owner_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Patient {
        Patient {
            id: "p-1".into(),
            name: "Max".into(),
            species: "dog".into(),
            breed: "Labrador".into(),
            age: 5.0,
            weight: 25.0,
            sex: Sex::Male,
            photo_url: None,
            owner_id: None,
            created_at: None,
            updated_at: None,
            owner: None,
        }
    }

    #[test]
    fn test_owner_display_without_owner() {
        assert_eq!(sample().owner_display(), NO_OWNER_LABEL);
    }

    #[test]
    fn test_deserialize_with_joined_owner() {
        let json = r#"{
            "id": "p-1", "name": "Max", "species": "dog", "breed": "Labrador",
            "age": 5, "weight": 25.5, "sex": "male", "photo_url": null,
            "owner_id": "o-1",
            "owners": {"id": "o-1", "name": "João Silva", "phone": "(11) 99999-9999",
                       "email": "joao.silva@email.com", "address": "Rua das Flores, 123"}
        }"#;
        let patient: Patient = serde_json::from_str(json).unwrap();
        assert_eq!(patient.age, 5.0);
        assert_eq!(patient.owner_display(), "João Silva");
        assert_eq!(patient.age_bracket(), Some(AgeBracket::Adult));
    }

    #[test]
    fn test_changes_skip_absent_fields() {
        let changes = PatientChanges {
            weight: Some(27.0),
            ..Default::default()
        };
        let value = serde_json::to_value(&changes).unwrap();
        assert_eq!(value, serde_json::json!({"weight": 27.0}));
    }

    #[test]
    fn test_changes_send_cleared_links_as_null() {
        let changes = PatientChanges {
            owner_id: Some(None),
            ..Default::default()
        };
        let value = serde_json::to_value(&changes).unwrap();
        assert_eq!(value, serde_json::json!({"owner_id": null}));

        let parsed: PatientChanges = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.owner_id, Some(None));
        assert_eq!(parsed.photo_url, None);
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!(Sex::parse("Female"), Some(Sex::Female));
        assert_eq!(Sex::parse("unknown"), None);
        assert_eq!(Sex::Male.label(), "Macho");
    }
}
