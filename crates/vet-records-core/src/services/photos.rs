//! Patient photo upload and removal.

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ClinicConfig, DEFAULT_PHOTO_BUCKET, DEFAULT_PHOTO_MAX_BYTES};
use crate::store::{BlobError, BlobStore, UploadOptions};

/// Directory inside the bucket holding patient photos.
pub const PHOTO_DIRECTORY: &str = "pet-photos";

/// Cache lifetime, in seconds, of uploaded photos.
pub const PHOTO_CACHE_SECONDS: &str = "3600";

/// Photo errors.
#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Not an image: {content_type:?}")]
    NotAnImage { content_type: String },

    #[error("Photo is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("Blob storage error: {0}")]
    Blob(#[from] BlobError),
}

pub type PhotoResult<T> = Result<T, PhotoError>;

/// A file picked by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFile {
    pub file_name: String,
    /// MIME type as reported by the picker
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Text after the last `.` of the file name; the whole name if there is none.
    pub fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .unwrap_or(&self.file_name)
    }
}

/// Where photos go and how large they may be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoPolicy {
    pub bucket: String,
    pub max_bytes: u64,
}

impl Default for PhotoPolicy {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_PHOTO_BUCKET.to_string(),
            max_bytes: DEFAULT_PHOTO_MAX_BYTES,
        }
    }
}

impl From<&ClinicConfig> for PhotoPolicy {
    fn from(config: &ClinicConfig) -> Self {
        Self {
            bucket: config.photo_bucket.clone(),
            max_bytes: config.photo_max_bytes,
        }
    }
}

/// Local checks run before any upload.
pub fn validate_photo(file: &PhotoFile, policy: &PhotoPolicy) -> PhotoResult<()> {
    if !file.content_type.starts_with("image/") {
        return Err(PhotoError::NotAnImage {
            content_type: file.content_type.clone(),
        });
    }
    if file.size() > policy.max_bytes {
        return Err(PhotoError::TooLarge {
            size: file.size(),
            limit: policy.max_bytes,
        });
    }
    Ok(())
}

/// Object path of a patient's photo: `pet-photos/{patient_key}.{ext}`.
pub fn photo_path(patient_key: &str, file: &PhotoFile) -> String {
    format!("{PHOTO_DIRECTORY}/{patient_key}.{}", file.extension())
}

/// Validate and upload a photo, replacing any previous one at the same
/// path. Returns the public URL.
pub async fn upload_pet_photo(
    blobs: &dyn BlobStore,
    policy: &PhotoPolicy,
    patient_key: &str,
    file: PhotoFile,
) -> PhotoResult<String> {
    validate_photo(&file, policy)?;

    let path = photo_path(patient_key, &file);
    let options = UploadOptions {
        overwrite: true,
        content_type: Some(file.content_type.clone()),
        cache_control: Some(PHOTO_CACHE_SECONDS.to_string()),
    };
    let size = file.size();
    blobs.upload(&policy.bucket, &path, file.bytes, &options).await?;

    info!(bucket = %policy.bucket, %path, size, "photo uploaded");
    Ok(blobs.public_url(&policy.bucket, &path))
}

/// Remove the photo behind a public URL. URLs without a final path
/// segment are ignored.
pub async fn delete_pet_photo(
    blobs: &dyn BlobStore,
    policy: &PhotoPolicy,
    photo_url: &str,
) -> PhotoResult<()> {
    let Some(file_name) = photo_url.rsplit('/').next().filter(|s| !s.is_empty()) else {
        warn!(photo_url, "photo URL has no file name; nothing to remove");
        return Ok(());
    };

    let path = format!("{PHOTO_DIRECTORY}/{file_name}");
    blobs.remove(&policy.bucket, &[path.clone()]).await?;
    info!(bucket = %policy.bucket, %path, "photo removed");
    Ok(())
}
