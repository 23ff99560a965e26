//! Vet Records Core Library
//!
//! Client core for a veterinary clinic: patient listing and search, patient
//! detail with owner and medical timeline, owner management and photo
//! upload, backed by a hosted table store and blob store.
//!
//! # Architecture
//!
//! ```text
//!  keystrokes / filter changes
//!             │
//!     SearchController (debounce, latest-wins)
//!             │
//!     compose_patient_query ──► TableStore ◄── services ◄── forms
//!                                   │                         │
//!                    RestTableStore / SqliteTableStore    BlobStore (photos)
//! ```
//!
//! # Modules
//!
//! - [`store`]: Table and blob store contracts with REST and local implementations
//! - [`models`]: Domain types (Patient, Owner, MedicalRecord)
//! - [`search`]: Filters, query composition and the debounced controller
//! - [`services`]: Typed CRUD and photo upload
//! - [`forms`]: Form state, validation and submission
//! - [`views`]: Patient detail view-model
//! - [`notify`]: Transient user notifications
//! - [`config`]: Environment configuration
//! - [`logging`]: Tracing subscriber setup

pub mod config;
pub mod forms;
pub mod logging;
pub mod models;
pub mod notify;
pub mod search;
pub mod services;
pub mod store;
pub mod views;

// Re-export commonly used types
pub use config::ClinicConfig;
pub use models::{MedicalRecord, MedicalRecordType, Owner, Patient, Sex};
pub use notify::{Notification, Notifier};
pub use search::{SearchController, SearchFilters, SearchHandle};
pub use store::{BlobStore, SqliteTableStore, TableStore};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use tokio::runtime::Runtime;

use forms::{FormContext, MedicalRecordForm, OwnerForm, PatientForm, SubmitError};
use notify::{LogNotifier, NotificationLevel};
use search::{SearchConfig, SearchState};
use services::{PhotoError, PhotoFile, PhotoPolicy};
use store::{FsBlobStore, MemoryBlobStore, RestBlobStore, RestTableStore};
use views::PatientDetail;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum VetRecordsError {
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Photo error: {0}")]
    PhotoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(String),
}

impl From<store::RemoteQueryError> for VetRecordsError {
    fn from(e: store::RemoteQueryError) -> Self {
        match e {
            store::RemoteQueryError::NotFound { table, id } => {
                VetRecordsError::NotFound(format!("{table}/{id}"))
            }
            other => VetRecordsError::StoreError(other.to_string()),
        }
    }
}

impl From<store::BlobError> for VetRecordsError {
    fn from(e: store::BlobError) -> Self {
        VetRecordsError::PhotoError(e.to_string())
    }
}

impl From<PhotoError> for VetRecordsError {
    fn from(e: PhotoError) -> Self {
        VetRecordsError::PhotoError(e.to_string())
    }
}

impl From<search::SearchError> for VetRecordsError {
    fn from(e: search::SearchError) -> Self {
        match e {
            search::SearchError::RemoteQuery(inner) => inner.into(),
            other => VetRecordsError::InvalidInput(other.to_string()),
        }
    }
}

impl From<forms::ValidationError> for VetRecordsError {
    fn from(e: forms::ValidationError) -> Self {
        VetRecordsError::InvalidInput(e.to_string())
    }
}

impl From<SubmitError> for VetRecordsError {
    fn from(e: SubmitError) -> Self {
        match e {
            SubmitError::Validation(inner) => inner.into(),
            SubmitError::Remote(inner) => inner.into(),
            SubmitError::Photo(inner) => inner.into(),
        }
    }
}

impl From<config::ConfigError> for VetRecordsError {
    fn from(e: config::ConfigError) -> Self {
        VetRecordsError::ConfigError(e.to_string())
    }
}

impl From<std::io::Error> for VetRecordsError {
    fn from(e: std::io::Error) -> Self {
        VetRecordsError::RuntimeError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for VetRecordsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        VetRecordsError::RuntimeError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Notification Callback
// =========================================================================

/// Receives transient notifications in the host UI.
#[uniffi::export(with_foreign)]
pub trait NotificationSink: Send + Sync {
    fn show(&self, is_error: bool, title: String, description: String);
}

struct ForeignNotifier(Arc<dyn NotificationSink>);

impl Notifier for ForeignNotifier {
    fn notify(&self, notification: Notification) {
        self.0.show(
            notification.level == NotificationLevel::Error,
            notification.title,
            notification.description,
        );
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install the stderr log subscriber. Later calls are no-ops.
#[uniffi::export]
pub fn enable_logging(verbose: bool) -> Result<(), VetRecordsError> {
    logging::init_logging(verbose).map_err(|e| VetRecordsError::RuntimeError(format!("{e:#}")))
}

/// Connect to the hosted backend.
#[uniffi::export]
pub fn connect(api_url: String, api_key: String) -> Result<Arc<VetRecordsCore>, VetRecordsError> {
    VetRecordsCore::hosted(ClinicConfig::new(api_url, api_key))
}

/// Connect to the hosted backend configured by `VET_RECORDS_*` variables.
#[uniffi::export]
pub fn connect_from_env() -> Result<Arc<VetRecordsCore>, VetRecordsError> {
    VetRecordsCore::hosted(ClinicConfig::from_env()?)
}

/// Open or create a local database, storing photos under `photo_dir`.
#[uniffi::export]
pub fn open_local(db_path: String, photo_dir: String) -> Result<Arc<VetRecordsCore>, VetRecordsError> {
    let store = SqliteTableStore::open(&db_path)?;
    VetRecordsCore::build(
        Arc::new(store),
        Arc::new(FsBlobStore::new(PathBuf::from(photo_dir))),
        PhotoPolicy::default(),
        SearchConfig::default(),
    )
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_in_memory() -> Result<Arc<VetRecordsCore>, VetRecordsError> {
    VetRecordsCore::build(
        Arc::new(SqliteTableStore::open_in_memory()?),
        Arc::new(MemoryBlobStore::new()),
        PhotoPolicy::default(),
        SearchConfig::default(),
    )
}

/// Filters offered by the patient search bar.
#[uniffi::export]
pub fn filter_definitions() -> Vec<FfiFilterDefinition> {
    search::default_filters()
        .into_iter()
        .map(|d| d.into())
        .collect()
}

// =========================================================================
// Main API Object
// =========================================================================

/// Blocking facade over the async core for FFI callers.
#[derive(uniffi::Object)]
pub struct VetRecordsCore {
    runtime: Runtime,
    store: Arc<dyn TableStore>,
    blobs: Arc<dyn BlobStore>,
    photos: PhotoPolicy,
    search: SearchConfig,
    notifier: RwLock<Arc<dyn Notifier>>,
}

impl VetRecordsCore {
    fn hosted(config: ClinicConfig) -> Result<Arc<Self>, VetRecordsError> {
        let client = store::build_http_client(&config)
            .map_err(|e| VetRecordsError::RuntimeError(e.to_string()))?;
        let table_store = RestTableStore::with_client(client.clone(), &config)?;
        let blob_store = RestBlobStore::with_client(client, &config)?;
        Self::build(
            Arc::new(table_store),
            Arc::new(blob_store),
            PhotoPolicy::from(&config),
            SearchConfig::from(&config),
        )
    }

    fn build(
        store: Arc<dyn TableStore>,
        blobs: Arc<dyn BlobStore>,
        photos: PhotoPolicy,
        search: SearchConfig,
    ) -> Result<Arc<Self>, VetRecordsError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("vet-records")
            .enable_all()
            .build()?;
        Ok(Arc::new(Self {
            runtime,
            store,
            blobs,
            photos,
            search,
            notifier: RwLock::new(Arc::new(LogNotifier)),
        }))
    }

    fn notifier(&self) -> Result<Arc<dyn Notifier>, VetRecordsError> {
        Ok(Arc::clone(&*self.notifier.read()?))
    }
}

#[uniffi::export]
impl VetRecordsCore {
    /// Route notifications to the host UI instead of the log.
    pub fn set_notification_sink(&self, sink: Arc<dyn NotificationSink>) -> Result<(), VetRecordsError> {
        *self.notifier.write()? = Arc::new(ForeignNotifier(sink));
        Ok(())
    }

    // =========================================================================
    // Search Operations
    // =========================================================================

    /// One-shot search with string-keyed filter selections.
    pub fn search_patients(
        &self,
        query: String,
        filters: HashMap<String, String>,
    ) -> Result<Vec<FfiPatient>, VetRecordsError> {
        let patients = self.runtime.block_on(search::search_patients_by_map(
            self.store.as_ref(),
            &query,
            &filters,
        ))?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    /// Start a debounced search session.
    pub fn start_search(&self) -> Result<Arc<SearchSession>, VetRecordsError> {
        let _guard = self.runtime.enter();
        let handle = SearchController::spawn(Arc::clone(&self.store), self.notifier()?, self.search);
        handle.refresh()?;
        Ok(Arc::new(SearchSession {
            runtime: self.runtime.handle().clone(),
            handle: Mutex::new(Some(handle)),
        }))
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, VetRecordsError> {
        let patients = self.runtime.block_on(services::list_patients(self.store.as_ref()))?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn get_patient(&self, id: String) -> Result<Option<FfiPatient>, VetRecordsError> {
        let patient = self.runtime.block_on(services::get_patient(self.store.as_ref(), &id))?;
        Ok(patient.map(|p| p.into()))
    }

    /// Create (no id) or update (id present) a patient.
    pub fn save_patient(&self, input: FfiPatientInput) -> Result<FfiPatient, VetRecordsError> {
        let form = PatientForm::try_from(input)?;
        let notifier = self.notifier()?;
        let ctx = FormContext::new(self.store.as_ref(), notifier.as_ref());
        let patient = self.runtime.block_on(form.submit(&ctx))?;
        Ok(patient.into())
    }

    pub fn delete_patient(&self, id: String) -> Result<(), VetRecordsError> {
        self.runtime
            .block_on(services::delete_patient(self.store.as_ref(), &id))?;
        Ok(())
    }

    /// Patient with owner panel and timeline.
    pub fn patient_detail(&self, id: String) -> Result<Option<FfiPatientDetail>, VetRecordsError> {
        let detail = self
            .runtime
            .block_on(PatientDetail::load(self.store.as_ref(), &id))?;
        Ok(detail.map(|d| d.into()))
    }

    // =========================================================================
    // Photo Operations
    // =========================================================================

    /// Upload a patient photo and return its public URL. The URL is saved
    /// with the next `save_patient`.
    pub fn upload_pet_photo(
        &self,
        patient_id: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> Result<String, VetRecordsError> {
        let mut form = PatientForm::for_patient(patient_id);
        let notifier = self.notifier()?;
        let file = PhotoFile {
            file_name,
            content_type,
            bytes,
        };
        let url = self.runtime.block_on(form.attach_photo(
            self.blobs.as_ref(),
            &self.photos,
            notifier.as_ref(),
            file,
        ))?;
        Ok(url)
    }

    pub fn delete_pet_photo(&self, photo_url: String) -> Result<(), VetRecordsError> {
        self.runtime.block_on(services::delete_pet_photo(
            self.blobs.as_ref(),
            &self.photos,
            &photo_url,
        ))?;
        Ok(())
    }

    // =========================================================================
    // Owner Operations
    // =========================================================================

    pub fn list_owners(&self) -> Result<Vec<FfiOwner>, VetRecordsError> {
        let owners = self.runtime.block_on(services::list_owners(self.store.as_ref()))?;
        Ok(owners.into_iter().map(|o| o.into()).collect())
    }

    pub fn get_owner(&self, id: String) -> Result<Option<FfiOwner>, VetRecordsError> {
        let owner = self.runtime.block_on(services::get_owner(self.store.as_ref(), &id))?;
        Ok(owner.map(|o| o.into()))
    }

    pub fn save_owner(&self, input: FfiOwnerInput) -> Result<FfiOwner, VetRecordsError> {
        let form = OwnerForm::from(input);
        let notifier = self.notifier()?;
        let ctx = FormContext::new(self.store.as_ref(), notifier.as_ref());
        let owner = self.runtime.block_on(form.submit(&ctx))?;
        Ok(owner.into())
    }

    pub fn delete_owner(&self, id: String) -> Result<(), VetRecordsError> {
        self.runtime
            .block_on(services::delete_owner(self.store.as_ref(), &id))?;
        Ok(())
    }

    // =========================================================================
    // Medical Record Operations
    // =========================================================================

    /// Timeline of a patient, most recent first.
    pub fn list_medical_records(&self, patient_id: String) -> Result<Vec<FfiMedicalRecord>, VetRecordsError> {
        let records = self
            .runtime
            .block_on(services::list_medical_records(self.store.as_ref(), &patient_id))?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    pub fn save_medical_record(
        &self,
        input: FfiMedicalRecordInput,
    ) -> Result<FfiMedicalRecord, VetRecordsError> {
        let form = MedicalRecordForm::try_from(input)?;
        let notifier = self.notifier()?;
        let ctx = FormContext::new(self.store.as_ref(), notifier.as_ref());
        let record = self.runtime.block_on(form.submit(&ctx))?;
        Ok(record.into())
    }

    pub fn delete_medical_record(&self, id: String) -> Result<(), VetRecordsError> {
        self.runtime
            .block_on(services::delete_medical_record(self.store.as_ref(), &id))?;
        Ok(())
    }
}

// =========================================================================
// Search Session
// =========================================================================

/// A running debounced search. Results are polled with `snapshot`.
#[derive(uniffi::Object)]
pub struct SearchSession {
    runtime: tokio::runtime::Handle,
    handle: Mutex<Option<SearchHandle>>,
}

impl SearchSession {
    fn with_handle<T>(
        &self,
        f: impl FnOnce(&SearchHandle) -> search::SearchResult<T>,
    ) -> Result<T, VetRecordsError> {
        let guard = self.handle.lock()?;
        let handle = guard.as_ref().ok_or(search::SearchError::ControllerClosed)?;
        Ok(f(handle)?)
    }
}

#[uniffi::export]
impl SearchSession {
    pub fn keystroke(&self, text: String) -> Result<(), VetRecordsError> {
        self.with_handle(|h| h.keystroke(text))
    }

    pub fn select_filter(&self, name: String, value: String) -> Result<(), VetRecordsError> {
        self.with_handle(|h| h.select_filter_by_name(&name, &value))
    }

    pub fn clear_filters(&self) -> Result<(), VetRecordsError> {
        self.with_handle(|h| h.clear_filters())
    }

    pub fn refresh(&self) -> Result<(), VetRecordsError> {
        self.with_handle(|h| h.refresh())
    }

    pub fn snapshot(&self) -> Result<FfiSearchSnapshot, VetRecordsError> {
        self.with_handle(|h| Ok(h.snapshot().into()))
    }

    /// Stop the session. Further calls fail.
    pub fn close(&self) -> Result<(), VetRecordsError> {
        let handle = self.handle.lock()?.take();
        if let Some(handle) = handle {
            self.runtime.block_on(handle.shutdown());
        }
        Ok(())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: f64,
    pub weight: f64,
    pub sex: String,
    pub photo_url: Option<String>,
    pub owner_id: Option<String>,
    /// Owner name or the "no owner" label
    pub owner_name: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            owner_name: patient.owner_display().to_string(),
            id: patient.id,
            name: patient.name,
            species: patient.species,
            breed: patient.breed,
            age: patient.age,
            weight: patient.weight,
            sex: patient.sex.as_str().to_string(),
            photo_url: patient.photo_url,
            owner_id: patient.owner_id,
        }
    }
}

/// FFI-safe patient form input. Numbers are entered as text.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientInput {
    pub id: Option<String>,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: String,
    pub weight: String,
    pub sex: String,
    pub owner_id: Option<String>,
    pub photo_url: Option<String>,
}

impl TryFrom<FfiPatientInput> for PatientForm {
    type Error = VetRecordsError;

    fn try_from(input: FfiPatientInput) -> Result<Self, Self::Error> {
        let sex = Sex::parse(&input.sex).ok_or_else(|| forms::ValidationError::InvalidChoice {
            field: "sex",
            value: input.sex.clone(),
        })?;
        let mut form = PatientForm::new();
        form.id = input.id;
        form.name = input.name;
        form.species = input.species;
        form.breed = input.breed;
        form.age = input.age;
        form.weight = input.weight;
        form.sex = sex;
        form.owner_id = input.owner_id;
        form.photo_url = input.photo_url;
        Ok(form)
    }
}

/// FFI-safe owner.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOwner {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub patients: Vec<FfiPatient>,
}

impl From<Owner> for FfiOwner {
    fn from(owner: Owner) -> Self {
        Self {
            id: owner.id,
            name: owner.name,
            phone: owner.phone,
            email: owner.email,
            address: owner.address,
            patients: owner.patients.into_iter().map(|p| p.into()).collect(),
        }
    }
}

/// FFI-safe owner form input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOwnerInput {
    pub id: Option<String>,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl From<FfiOwnerInput> for OwnerForm {
    fn from(input: FfiOwnerInput) -> Self {
        OwnerForm {
            id: input.id,
            name: input.name,
            phone: input.phone,
            email: input.email,
            address: input.address,
        }
    }
}

/// FFI-safe medical record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicalRecord {
    pub id: String,
    pub patient_id: String,
    pub record_type: String,
    pub type_label: String,
    pub title: String,
    pub description: String,
    pub professional: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `dd/mm/yyyy`
    pub date_label: String,
}

impl From<MedicalRecord> for FfiMedicalRecord {
    fn from(record: MedicalRecord) -> Self {
        Self {
            id: record.id,
            patient_id: record.patient_id,
            record_type: record.record_type.as_str().to_string(),
            type_label: record.record_type.label().to_string(),
            title: record.title,
            description: record.description,
            professional: record.professional,
            date: record.date.format("%Y-%m-%d").to_string(),
            date_label: record.date.format("%d/%m/%Y").to_string(),
        }
    }
}

/// FFI-safe medical record form input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicalRecordInput {
    pub record_id: Option<String>,
    pub patient_id: String,
    pub record_type: String,
    pub title: String,
    pub description: String,
    pub professional: String,
    pub date: String,
}

impl TryFrom<FfiMedicalRecordInput> for MedicalRecordForm {
    type Error = VetRecordsError;

    fn try_from(input: FfiMedicalRecordInput) -> Result<Self, Self::Error> {
        let record_type = MedicalRecordType::parse(&input.record_type).ok_or_else(|| {
            forms::ValidationError::InvalidChoice {
                field: "type",
                value: input.record_type.clone(),
            }
        })?;
        Ok(MedicalRecordForm {
            patient_id: input.patient_id,
            record_id: input.record_id,
            record_type,
            title: input.title,
            description: input.description,
            professional: input.professional,
            date: input.date,
        })
    }
}

/// FFI-safe patient detail.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientDetail {
    pub patient: FfiPatient,
    /// "species • breed"
    pub title_line: String,
    /// "{age} anos • {weight}kg • {sex}"
    pub header_line: String,
    pub owner_lines: Vec<String>,
    pub timeline: Vec<FfiTimelineEntry>,
}

impl From<PatientDetail> for FfiPatientDetail {
    fn from(detail: PatientDetail) -> Self {
        Self {
            title_line: detail.title_line(),
            header_line: detail.header_line(),
            owner_lines: detail.owner.lines().into_iter().map(String::from).collect(),
            timeline: detail
                .timeline
                .iter()
                .map(|entry| FfiTimelineEntry {
                    id: entry.id.clone(),
                    kind_label: entry.kind_label().to_string(),
                    title: entry.title.clone(),
                    description: entry.description.clone(),
                    professional: entry.professional.clone(),
                    date_label: entry.date_label(),
                })
                .collect(),
            patient: detail.patient.into(),
        }
    }
}

/// FFI-safe timeline row.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTimelineEntry {
    pub id: String,
    pub kind_label: String,
    pub title: String,
    pub description: String,
    pub professional: String,
    pub date_label: String,
}

/// FFI-safe search snapshot.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSearchSnapshot {
    /// "idle", "pending" or "querying"
    pub state: String,
    /// Typed text awaiting the quiet period
    pub pending_query: Option<String>,
    pub query: String,
    pub patients: Vec<FfiPatient>,
    pub generation: u64,
}

impl From<search::SearchSnapshot> for FfiSearchSnapshot {
    fn from(snapshot: search::SearchSnapshot) -> Self {
        let (state, pending_query) = match snapshot.state {
            SearchState::Idle => ("idle", None),
            SearchState::PendingDebounce(text) => ("pending", Some(text)),
            SearchState::Querying => ("querying", None),
        };
        Self {
            state: state.to_string(),
            pending_query,
            query: snapshot.query,
            patients: snapshot.patients.iter().cloned().map(|p| p.into()).collect(),
            generation: snapshot.generation,
        }
    }
}

/// FFI-safe filter definition.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFilterDefinition {
    pub name: String,
    pub label: String,
    pub options: Vec<FfiFilterOption>,
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFilterOption {
    pub value: String,
    pub label: String,
}

impl From<search::FilterDefinition> for FfiFilterDefinition {
    fn from(definition: search::FilterDefinition) -> Self {
        Self {
            name: definition.kind.key().to_string(),
            label: definition.label.to_string(),
            options: definition
                .options
                .into_iter()
                .map(|o| FfiFilterOption {
                    value: o.value.to_string(),
                    label: o.label.to_string(),
                })
                .collect(),
        }
    }
}
