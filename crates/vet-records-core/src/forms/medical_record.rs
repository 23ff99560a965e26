//! Medical record form.

use chrono::{Local, NaiveDate};

use super::{required, FormContext, SubmitResult, ValidationError, ValidationResult};
use crate::models::{MedicalRecord, MedicalRecordChanges, MedicalRecordType, NewMedicalRecord};
use crate::notify::messages;
use crate::services::{create_medical_record, update_medical_record};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timeline entry form, bound to one patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicalRecordForm {
    pub patient_id: String,
    /// Set when editing an existing record
    pub record_id: Option<String>,
    pub record_type: MedicalRecordType,
    pub title: String,
    pub description: String,
    pub professional: String,
    /// `YYYY-MM-DD`
    pub date: String,
}

impl MedicalRecordForm {
    /// Empty consultation dated today.
    pub fn new(patient_id: impl Into<String>) -> Self {
        Self {
            patient_id: patient_id.into(),
            record_id: None,
            record_type: MedicalRecordType::Consultation,
            title: String::new(),
            description: String::new(),
            professional: String::new(),
            date: Local::now().date_naive().format(DATE_FORMAT).to_string(),
        }
    }

    pub fn with_type(mut self, record_type: MedicalRecordType) -> Self {
        self.record_type = record_type;
        self
    }

    pub fn edit(record: &MedicalRecord) -> Self {
        Self {
            patient_id: record.patient_id.clone(),
            record_id: Some(record.id.clone()),
            record_type: record.record_type,
            title: record.title.clone(),
            description: record.description.clone(),
            professional: record.professional.clone(),
            date: record.date.format(DATE_FORMAT).to_string(),
        }
    }

    pub fn validate(&self) -> ValidationResult<NewMedicalRecord> {
        let patient_id = required("patient_id", &self.patient_id)?;
        let title = required("title", &self.title)?;
        let description = required("description", &self.description)?;
        let professional = required("professional", &self.professional)?;
        let date_text = required("date", &self.date)?;
        let date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).map_err(|_| {
            ValidationError::InvalidDate {
                field: "date",
                value: date_text.clone(),
            }
        })?;

        Ok(NewMedicalRecord {
            patient_id,
            record_type: self.record_type,
            title,
            description,
            professional,
            date,
        })
    }

    pub async fn submit(&self, ctx: &FormContext<'_>) -> SubmitResult<MedicalRecord> {
        let record = self.validate()?;
        match &self.record_id {
            Some(id) => {
                let changes = MedicalRecordChanges {
                    record_type: Some(record.record_type),
                    title: Some(record.title),
                    description: Some(record.description),
                    professional: Some(record.professional),
                    date: Some(record.date),
                };
                let result = update_medical_record(ctx.store, id, &changes).await;
                ctx.finish(result, messages::RECORD_UPDATED, messages::RECORD_UPDATE_FAILED)
            }
            None => {
                let result = create_medical_record(ctx.store, &record).await;
                ctx.finish(result, messages::RECORD_CREATED, messages::RECORD_CREATE_FAILED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::SubmitError;
    use crate::models::{NewPatient, Sex};
    use crate::notify::ChannelNotifier;
    use crate::services::{create_patient, list_medical_records};
    use crate::store::SqliteTableStore;

    fn filled(patient_id: &str) -> MedicalRecordForm {
        MedicalRecordForm {
            title: "Vacina V10".into(),
            description: "Reforço anual".into(),
            professional: "Dra. Ana".into(),
            date: "2024-06-01".into(),
            ..MedicalRecordForm::new(patient_id).with_type(MedicalRecordType::Vaccine)
        }
    }

    #[test]
    fn test_defaults_to_today() {
        let form = MedicalRecordForm::new("p-1");
        assert_eq!(form.record_type, MedicalRecordType::Consultation);
        assert!(NaiveDate::parse_from_str(&form.date, DATE_FORMAT).is_ok());
    }

    #[test]
    fn test_invalid_date() {
        let form = MedicalRecordForm {
            date: "01/06/2024".into(),
            ..filled("p-1")
        };
        assert!(matches!(
            form.validate(),
            Err(ValidationError::InvalidDate { field: "date", .. })
        ));
    }

    #[tokio::test]
    async fn test_submit_for_unknown_patient_fails() {
        let store = SqliteTableStore::open_in_memory().unwrap();
        let (notifier, mut rx) = ChannelNotifier::new();
        let ctx = FormContext::new(&store, &notifier);

        let result = filled("ghost").submit(&ctx).await;
        assert!(matches!(result, Err(SubmitError::Remote(_))));
        assert_eq!(rx.try_recv().unwrap().description, messages::RECORD_CREATE_FAILED);
    }

    #[tokio::test]
    async fn test_submit_and_edit() {
        let store = SqliteTableStore::open_in_memory().unwrap();
        let patient = create_patient(
            &store,
            &NewPatient {
                name: "Nina".into(),
                species: "dog".into(),
                breed: "Poodle".into(),
                age: 9.0,
                weight: 6.0,
                sex: Sex::Female,
                photo_url: None,
                owner_id: None,
            },
        )
        .await
        .unwrap();
        let (notifier, mut rx) = ChannelNotifier::new();
        let ctx = FormContext::new(&store, &notifier);

        let created = filled(&patient.id).submit(&ctx).await.unwrap();
        assert_eq!(created.record_type, MedicalRecordType::Vaccine);
        assert_eq!(rx.try_recv().unwrap().description, messages::RECORD_CREATED);

        let mut edit = MedicalRecordForm::edit(&created);
        assert_eq!(edit.date, "2024-06-01");
        edit.title = "Vacina V10 (reforço)".into();
        edit.submit(&ctx).await.unwrap();

        let timeline = list_medical_records(&store, &patient.id).await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].title, "Vacina V10 (reforço)");
    }
}
