//! Medical record (timeline entry) models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Table;

/// Kind of timeline event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MedicalRecordType {
    Consultation,
    Vaccine,
    Procedure,
}

impl MedicalRecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicalRecordType::Consultation => "consultation",
            MedicalRecordType::Vaccine => "vaccine",
            MedicalRecordType::Procedure => "procedure",
        }
    }

    /// Display label in the clinic locale.
    pub fn label(&self) -> &'static str {
        match self {
            MedicalRecordType::Consultation => "Consulta",
            MedicalRecordType::Vaccine => "Vacina",
            MedicalRecordType::Procedure => "Procedimento",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "consultation" => Some(MedicalRecordType::Consultation),
            "vaccine" => Some(MedicalRecordType::Vaccine),
            "procedure" => Some(MedicalRecordType::Procedure),
            _ => None,
        }
    }
}

/// A single medical record belonging to a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecord {
    pub id: String,
    /// Patient this record belongs to (required)
    pub patient_id: String,
    #[serde(rename = "type")]
    pub record_type: MedicalRecordType,
    pub title: String,
    pub description: String,
    /// Attending professional's name
    pub professional: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Table for MedicalRecord {
    const NAME: &'static str = "medical_records";
}

/// Fields for creating a medical record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMedicalRecord {
    pub patient_id: String,
    #[serde(rename = "type")]
    pub record_type: MedicalRecordType,
    pub title: String,
    pub description: String,
    pub professional: String,
    pub date: NaiveDate,
}

/// Partial update for a medical record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecordChanges {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub record_type: Option<MedicalRecordType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professional: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}
