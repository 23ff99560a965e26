//! Patient registration form.

use tracing::warn;

use super::{optional, parse_non_negative, required, FormContext, SubmitResult, ValidationResult};
use crate::models::{NewPatient, Patient, PatientChanges, Sex};
use crate::notify::{messages, Notification, Notifier};
use crate::services::{create_patient, update_patient, upload_pet_photo, PhotoError, PhotoFile, PhotoPolicy};
use crate::store::{format_number, BlobStore};

/// Editable patient fields, as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientForm {
    /// Set when editing an existing patient
    pub id: Option<String>,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: String,
    pub weight: String,
    pub sex: Sex,
    pub owner_id: Option<String>,
    /// Uploaded photo, saved with the patient
    pub photo_url: Option<String>,
    /// Photo key used before the patient has an id
    draft_key: Option<String>,
}

impl PatientForm {
    /// Empty form for a new patient.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty form bound to an existing patient id, for photo uploads outside a full edit.
    pub fn for_patient(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Form pre-filled from an existing patient.
    pub fn edit(patient: &Patient) -> Self {
        Self {
            id: Some(patient.id.clone()),
            name: patient.name.clone(),
            species: patient.species.clone(),
            breed: patient.breed.clone(),
            age: format_number(patient.age),
            weight: format_number(patient.weight),
            sex: patient.sex,
            owner_id: patient.owner_id.clone(),
            photo_url: patient.photo_url.clone(),
            draft_key: None,
        }
    }

    pub fn is_editing(&self) -> bool {
        self.id.is_some()
    }

    pub fn validate(&self) -> ValidationResult<NewPatient> {
        Ok(NewPatient {
            name: required("name", &self.name)?,
            species: required("species", &self.species)?,
            breed: required("breed", &self.breed)?,
            age: parse_non_negative("age", &self.age)?,
            weight: parse_non_negative("weight", &self.weight)?,
            sex: self.sex,
            photo_url: optional(&self.photo_url),
            owner_id: optional(&self.owner_id),
        })
    }

    /// Key the photo is stored under: the patient id, or a draft key for new patients.
    fn photo_key(&mut self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        self.draft_key
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone()
    }

    /// Upload a photo and keep its URL pending until the form is saved.
    pub async fn attach_photo(
        &mut self,
        blobs: &dyn BlobStore,
        policy: &PhotoPolicy,
        notifier: &dyn Notifier,
        file: PhotoFile,
    ) -> SubmitResult<String> {
        let key = self.photo_key();
        match upload_pet_photo(blobs, policy, &key, file).await {
            Ok(url) => {
                self.photo_url = Some(url.clone());
                notifier.notify(Notification::success(messages::PHOTO_UPLOADED));
                Ok(url)
            }
            Err(err) => {
                warn!(error = %err, "photo rejected");
                let message = match &err {
                    PhotoError::NotAnImage { .. } => messages::PHOTO_NOT_IMAGE.to_string(),
                    PhotoError::TooLarge { limit, .. } => messages::photo_too_large(*limit),
                    PhotoError::Blob(_) => messages::PHOTO_UPLOAD_FAILED.to_string(),
                };
                notifier.notify(Notification::error(message));
                Err(err.into())
            }
        }
    }

    /// Validate, then create or update the patient.
    pub async fn submit(&self, ctx: &FormContext<'_>) -> SubmitResult<Patient> {
        let patient = self.validate()?;
        match &self.id {
            Some(id) => {
                let result = update_patient(ctx.store, id, &PatientChanges::from(patient)).await;
                ctx.finish(
                    result,
                    messages::PATIENT_UPDATED,
                    messages::PATIENT_UPDATE_FAILED,
                )
            }
            None => {
                let result = create_patient(ctx.store, &patient).await;
                ctx.finish(
                    result,
                    messages::PATIENT_CREATED,
                    messages::PATIENT_CREATE_FAILED,
                )
            }
        }
    }
}
