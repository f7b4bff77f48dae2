use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::store::{sanitize_file_name, FileStore, StoreError};
use crate::error::ApiError;
use crate::people::Person;
use crate::records::{Record, RecordId, Repository, RepositoryError, ValidationError};

/// Extensions accepted for uploaded documents.
pub const ALLOWED_EXTENSIONS: [&str; 9] = [
    "pdf", "jpg", "jpeg", "png", "doc", "docx", "xls", "xlsx", "csv",
];

/// Metadata kept for each stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    #[serde(default)]
    pub id: RecordId,
    pub original_name: String,
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    #[serde(default)]
    pub person_id: Option<RecordId>,
    pub uploaded_at: DateTime<Utc>,
}

impl Record for UploadRecord {
    const RESOURCE: &'static str = "upload";

    fn id(&self) -> RecordId {
        self.id
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = id;
    }
}

pub struct UploadService {
    records: Arc<dyn Repository<UploadRecord>>,
    people: Arc<dyn Repository<Person>>,
    store: Arc<dyn FileStore>,
    max_bytes: u64,
}

impl UploadService {
    pub fn new(
        records: Arc<dyn Repository<UploadRecord>>,
        people: Arc<dyn Repository<Person>>,
        store: Arc<dyn FileStore>,
        max_bytes: u64,
    ) -> Self {
        Self {
            records,
            people,
            store,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Validate and persist a document, returning its metadata.
    pub fn store(
        &self,
        name: &str,
        bytes: &[u8],
        person_id: Option<RecordId>,
    ) -> Result<UploadRecord, UploadError> {
        let original_name = name.trim();
        if original_name.is_empty() {
            return Err(UploadError::MissingName);
        }
        if bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        let size_bytes = bytes.len() as u64;
        if size_bytes > self.max_bytes {
            return Err(UploadError::TooLarge {
                size: size_bytes,
                max: self.max_bytes,
            });
        }
        let extension = extension_of(original_name);
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(UploadError::Extension(extension));
        }
        if let Some(id) = person_id {
            if self.people.fetch(id)?.is_none() {
                return Err(UploadError::PersonNotFound(id));
            }
        }

        let content_type = mime_guess::from_path(original_name)
            .first()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
            .to_string();

        let mut record = self.records.insert(UploadRecord {
            id: 0,
            original_name: original_name.to_string(),
            stored_name: String::new(),
            content_type,
            size_bytes,
            person_id,
            uploaded_at: Utc::now(),
        })?;
        record.stored_name = format!("{}-{}", record.id, sanitize_file_name(original_name));

        if let Err(err) = self.store.save(&record.stored_name, bytes) {
            if let Err(rollback) = self.records.delete(record.id) {
                warn!(
                    upload_id = record.id,
                    error = %rollback,
                    "failed to discard metadata for unsaved upload"
                );
            }
            return Err(err.into());
        }
        let record = self.records.update(record)?;

        info!(
            upload_id = record.id,
            stored_name = %record.stored_name,
            size_bytes,
            content_type = %record.content_type,
            "document uploaded"
        );
        Ok(record)
    }

    pub fn get(&self, id: RecordId) -> Result<UploadRecord, UploadError> {
        self.records.fetch(id)?.ok_or(UploadError::NotFound(id))
    }

    pub fn list(&self, person_id: Option<RecordId>) -> Result<Vec<UploadRecord>, UploadError> {
        Ok(self
            .records
            .list()?
            .into_iter()
            .filter(|record| person_id.map_or(true, |id| record.person_id == Some(id)))
            .collect())
    }

    pub fn content(&self, id: RecordId) -> Result<(UploadRecord, Vec<u8>), UploadError> {
        let record = self.get(id)?;
        let bytes = self.store.read(&record.stored_name)?;
        Ok((record, bytes))
    }

    /// Drop the stored bytes, then the metadata. A file already missing on disk is not an
    /// error; any other store failure keeps the metadata in place.
    pub fn remove(&self, id: RecordId) -> Result<UploadRecord, UploadError> {
        let record = self.get(id)?;
        match self.store.remove(&record.stored_name) {
            Ok(()) => {}
            Err(StoreError::NotFound(name)) => {
                warn!(upload_id = id, stored_name = %name, "stored file already missing");
            }
            Err(err) => return Err(err.into()),
        }
        let record = self.records.delete(id).map_err(|err| match err {
            RepositoryError::NotFound => UploadError::NotFound(id),
            other => other.into(),
        })?;
        info!(upload_id = id, "document removed");
        Ok(record)
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("a file name is required")]
    MissingName,
    #[error("uploaded file is empty")]
    Empty,
    #[error("file is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },
    #[error("file type '{0}' is not accepted")]
    Extension(String),
    #[error("person {0} does not exist")]
    PersonNotFound(RecordId),
    #[error("upload {0} not found")]
    NotFound(RecordId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<UploadError> for ApiError {
    fn from(value: UploadError) -> Self {
        match value {
            UploadError::NotFound(id) => ApiError::not_found("upload", id),
            UploadError::MissingName => ValidationError::new("name", value.to_string()).into(),
            UploadError::Empty | UploadError::TooLarge { .. } | UploadError::Extension(_) => {
                ValidationError::new("file", value.to_string()).into()
            }
            UploadError::PersonNotFound(_) => {
                ValidationError::new("person_id", value.to_string()).into()
            }
            UploadError::Store(StoreError::NotFound(_)) => ApiError::Missing(value.to_string()),
            UploadError::Store(err) => {
                ApiError::Repository(RepositoryError::Unavailable(err.to_string()))
            }
            UploadError::Repository(err) => ApiError::Repository(err),
        }
    }
}
