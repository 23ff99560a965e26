//! Patient detail view-model.

use chrono::NaiveDate;
use tracing::error;

use crate::models::{MedicalRecord, MedicalRecordType, Owner, Patient, NO_OWNER_LABEL};
use crate::notify::{messages, Notification, Notifier};
use crate::services::{get_patient, list_medical_records};
use crate::store::{format_number, StoreResult, TableStore};

/// Shown when a patient has no medical records.
pub const EMPTY_TIMELINE_LABEL: &str = "Nenhum registro médico encontrado";

/// Owner section of the detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerPanel {
    Registered {
        name: String,
        phone: String,
        email: String,
        address: String,
    },
    Missing,
}

impl OwnerPanel {
    pub fn from_owner(owner: Option<&Owner>) -> Self {
        match owner {
            Some(owner) => OwnerPanel::Registered {
                name: owner.name.clone(),
                phone: owner.phone.clone(),
                email: owner.email.clone(),
                address: owner.address.clone(),
            },
            None => OwnerPanel::Missing,
        }
    }

    /// Lines to display, in order.
    pub fn lines(&self) -> Vec<&str> {
        match self {
            OwnerPanel::Registered {
                name,
                phone,
                email,
                address,
            } => vec![name.as_str(), phone.as_str(), email.as_str(), address.as_str()],
            OwnerPanel::Missing => vec![NO_OWNER_LABEL],
        }
    }
}

/// One timeline row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub id: String,
    pub kind: MedicalRecordType,
    pub title: String,
    pub description: String,
    pub professional: String,
    pub date: NaiveDate,
}

impl TimelineEntry {
    pub fn kind_label(&self) -> &'static str {
        self.kind.label()
    }

    /// `dd/mm/yyyy`
    pub fn date_label(&self) -> String {
        self.date.format("%d/%m/%Y").to_string()
    }
}

impl From<MedicalRecord> for TimelineEntry {
    fn from(record: MedicalRecord) -> Self {
        Self {
            id: record.id,
            kind: record.record_type,
            title: record.title,
            description: record.description,
            professional: record.professional,
            date: record.date,
        }
    }
}

/// Everything the patient detail screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientDetail {
    pub patient: Patient,
    pub owner: OwnerPanel,
    /// Most recent first
    pub timeline: Vec<TimelineEntry>,
}

impl PatientDetail {
    /// Load a patient with owner and timeline. `None` if the id is unknown.
    pub async fn load(store: &dyn TableStore, patient_id: &str) -> StoreResult<Option<Self>> {
        let Some(patient) = get_patient(store, patient_id).await? else {
            return Ok(None);
        };
        let timeline = list_medical_records(store, patient_id)
            .await?
            .into_iter()
            .map(TimelineEntry::from)
            .collect();

        Ok(Some(Self {
            owner: OwnerPanel::from_owner(patient.owner.as_ref()),
            patient,
            timeline,
        }))
    }

    /// "species • breed"
    pub fn title_line(&self) -> String {
        self.patient.summary_line()
    }

    /// "{age} anos • {weight}kg • {sex}"
    pub fn header_line(&self) -> String {
        format!(
            "{} anos • {}kg • {}",
            format_number(self.patient.age),
            format_number(self.patient.weight),
            self.patient.sex.label()
        )
    }
}

/// Load a patient's timeline for display. On failure, notifies once and
/// shows an empty timeline.
pub async fn load_timeline(
    store: &dyn TableStore,
    notifier: &dyn Notifier,
    patient_id: &str,
) -> Vec<TimelineEntry> {
    match list_medical_records(store, patient_id).await {
        Ok(records) => records.into_iter().map(TimelineEntry::from).collect(),
        Err(err) => {
            error!(error = %err, patient_id, "failed to load medical records");
            notifier.notify(Notification::error(messages::TIMELINE_LOAD_FAILED));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewMedicalRecord, NewOwner, NewPatient, Sex};
    use crate::notify::ChannelNotifier;
    use crate::services::{create_medical_record, create_owner, create_patient};
    use crate::store::{Record, RemoteQueryError, SqliteTableStore, TableQuery};

    async fn seed(store: &SqliteTableStore, with_owner: bool) -> String {
        let owner_id = if with_owner {
            let owner = create_owner(
                store,
                &NewOwner {
                    name: "João Lima".into(),
                    phone: "(41) 3000-1000".into(),
                    email: "joao@example.com".into(),
                    address: "Rua XV, 200".into(),
                },
            )
            .await
            .unwrap();
            Some(owner.id)
        } else {
            None
        };
        let patient = create_patient(
            store,
            &NewPatient {
                name: "Pipoca".into(),
                species: "dog".into(),
                breed: "Beagle".into(),
                age: 5.0,
                weight: 11.5,
                sex: Sex::Female,
                photo_url: None,
                owner_id,
            },
        )
        .await
        .unwrap();

        for (title, day) in [("Consulta inicial", 3), ("Vacina", 20)] {
            create_medical_record(
                store,
                &NewMedicalRecord {
                    patient_id: patient.id.clone(),
                    record_type: MedicalRecordType::Consultation,
                    title: title.into(),
                    description: "-".into(),
                    professional: "Dra. Ana".into(),
                    date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
                },
            )
            .await
            .unwrap();
        }
        patient.id
    }

    #[tokio::test]
    async fn test_detail_with_owner() {
        let store = SqliteTableStore::open_in_memory().unwrap();
        let id = seed(&store, true).await;

        let detail = PatientDetail::load(&store, &id).await.unwrap().unwrap();
        assert_eq!(detail.header_line(), "5 anos • 11.5kg • Fêmea");
        assert_eq!(detail.title_line(), "dog • Beagle");
        assert_eq!(detail.owner.lines()[0], "João Lima");
        assert_eq!(detail.timeline.len(), 2);
        assert_eq!(detail.timeline[0].title, "Vacina");
        assert_eq!(detail.timeline[0].date_label(), "20/04/2024");
        assert_eq!(detail.timeline[0].kind_label(), "Consulta");
    }

    #[tokio::test]
    async fn test_detail_without_owner() {
        let store = SqliteTableStore::open_in_memory().unwrap();
        let id = seed(&store, false).await;

        let detail = PatientDetail::load(&store, &id).await.unwrap().unwrap();
        assert_eq!(detail.owner, OwnerPanel::Missing);
        assert_eq!(detail.owner.lines(), vec![NO_OWNER_LABEL]);
        assert!(PatientDetail::load(&store, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_timeline() {
        let store = SqliteTableStore::open_in_memory().unwrap();
        let (notifier, mut rx) = ChannelNotifier::new();
        let id = seed(&store, false).await;

        let entries = load_timeline(&store, &notifier, &id).await;
        assert_eq!(entries.len(), 2);
        assert!(rx.try_recv().is_err());
    }

    struct OfflineStore;

    #[async_trait::async_trait]
    impl TableStore for OfflineStore {
        async fn query(&self, _query: &TableQuery) -> StoreResult<Vec<Record>> {
            Err(RemoteQueryError::Status {
                status: 503,
                body: "offline".into(),
            })
        }

        async fn insert(&self, _table: &str, _fields: Record) -> StoreResult<Record> {
            unreachable!()
        }

        async fn update(&self, _table: &str, _id: &str, _fields: Record) -> StoreResult<Record> {
            unreachable!()
        }

        async fn delete(&self, _table: &str, _id: &str) -> StoreResult<()> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_load_timeline_failure_notifies_once() {
        let (notifier, mut rx) = ChannelNotifier::new();

        let entries = load_timeline(&OfflineStore, &notifier, "p-1").await;
        assert!(entries.is_empty());

        let notification = rx.try_recv().unwrap();
        assert!(notification.is_error());
        assert_eq!(notification.description, messages::TIMELINE_LOAD_FAILED);
        assert!(rx.try_recv().is_err());
    }
}
