//! Blob (object) storage for patient photos.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Blob storage errors.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid object path: {0:?}")]
    InvalidPath(String),
}

pub type BlobResult<T> = Result<T, BlobError>;

/// Options for a single upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    /// Replace an existing object at the same path
    pub overwrite: bool,
    pub content_type: Option<String>,
    /// Cache lifetime in seconds, as sent in `cache-control`
    pub cache_control: Option<String>,
}

/// Object storage contract.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `bytes` to `path` inside `bucket`.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> BlobResult<()>;

    /// Remove objects. Missing objects are ignored.
    async fn remove(&self, bucket: &str, paths: &[String]) -> BlobResult<()>;

    /// Public URL for an object. Does not check that it exists.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// In-process blob store (for testing).
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<(String, String), StoredBlob>>,
    uploads: Mutex<usize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a stored object.
    pub fn get(&self, bucket: &str, path: &str) -> Option<StoredBlob> {
        self.objects
            .lock()
            .ok()?
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    /// Number of upload calls received, successful or not.
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().map(|n| *n).unwrap_or_default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> BlobResult<()> {
        if let Ok(mut uploads) = self.uploads.lock() {
            *uploads += 1;
        }
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        let key = (bucket.to_string(), path.to_string());
        if !options.overwrite && objects.contains_key(&key) {
            return Err(BlobError::AlreadyExists(path.to_string()));
        }
        objects.insert(
            key,
            StoredBlob {
                bytes,
                content_type: options.content_type.clone(),
            },
        );
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> BlobResult<()> {
        if let Ok(mut objects) = self.objects.lock() {
            for path in paths {
                objects.remove(&(bucket.to_string(), path.clone()));
            }
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://{bucket}/{path}")
    }
}

/// Directory-backed blob store, one subdirectory per bucket.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve an object path, refusing anything that escapes the bucket.
    fn resolve(&self, bucket: &str, path: &str) -> BlobResult<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe || !Path::new(bucket).components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(BlobError::InvalidPath(format!("{bucket}/{path}")));
        }
        Ok(self.root.join(bucket).join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> BlobResult<()> {
        let target = self.resolve(bucket, path)?;
        if !options.overwrite && tokio::fs::try_exists(&target).await? {
            return Err(BlobError::AlreadyExists(path.to_string()));
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!(path = %target.display(), "stored blob");
        Ok(())
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> BlobResult<()> {
        for path in paths {
            let target = self.resolve(bucket, path)?;
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("file://{}", self.root.join(bucket).join(path).display())
    }
}
