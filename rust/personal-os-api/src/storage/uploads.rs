//! Upload workflow: validate, store bytes, record metadata.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::{ObjectStorage, storage_path, validate_file};
use crate::database;
use crate::domain::Upload;
use crate::error::{AppError, AppResult};
use crate::journal::EntryStore;

/// A file received from a client.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
    pub category: Option<String>,
}

#[derive(Clone)]
pub struct UploadService {
    store: EntryStore,
    storage: Option<Arc<dyn ObjectStorage>>,
    signed_url_ttl: Duration,
}

impl std::fmt::Debug for UploadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadService")
            .field("storage", &self.storage.as_ref().map(|s| s.name()))
            .field("signed_url_ttl", &self.signed_url_ttl)
            .finish_non_exhaustive()
    }
}

impl UploadService {
    #[must_use]
    pub fn new(
        store: EntryStore,
        storage: Option<Arc<dyn ObjectStorage>>,
        signed_url_ttl: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            signed_url_ttl,
        }
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.storage.is_some()
    }

    fn storage(&self) -> AppResult<&Arc<dyn ObjectStorage>> {
        self.storage
            .as_ref()
            .ok_or_else(|| AppError::unavailable("File storage is not configured"))
    }

    /// Validate, store the bytes, then record metadata.
    pub async fn upload(&self, user_id: &str, file: NewUpload) -> AppResult<Upload> {
        validate_file(file.bytes.len(), &file.content_type)?;
        let storage = self.storage()?;

        let category = file
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        let uploaded_at = database::now();
        let path = storage_path(
            user_id,
            category.as_deref(),
            uploaded_at.timestamp_millis(),
            &file.file_name,
        );
        let size = file.bytes.len();

        storage
            .upload(&path, file.bytes, &file.content_type)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, path = %path, error = %format!("{e:#}"), "Object upload failed");
                AppError::unavailable("Failed to upload file")
            })?;

        let upload = Upload {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            file_name: file.file_name,
            file_size: size as u64,
            file_type: file.content_type,
            storage_path: path,
            category,
            uploaded_at,
        };
        if let Err(err) = self.store.record_upload(&upload).await {
            // Do not leave an orphaned object behind.
            if let Err(cleanup) = storage.delete(&upload.storage_path).await {
                tracing::warn!(path = %upload.storage_path, error = %cleanup, "Orphan cleanup failed");
            }
            return Err(err);
        }
        Ok(upload)
    }

    /// Signed download URL for an upload the caller owns.
    pub async fn download_url(&self, user_id: &str, id: &str) -> AppResult<String> {
        let upload = self.store.get_upload(user_id, id).await?;
        let storage = self.storage()?;
        storage
            .sign(&upload.storage_path, self.signed_url_ttl)
            .await
            .map_err(|e| {
                tracing::error!(upload_id = %id, error = %format!("{e:#}"), "Signing failed");
                AppError::unavailable("Failed to generate download URL")
            })
    }

    /// Remove the metadata record. Object deletion is best effort and never
    /// blocks it.
    pub async fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        let upload = self.store.get_upload(user_id, id).await?;
        match self.storage.as_ref() {
            Some(storage) => {
                if let Err(err) = storage.delete(&upload.storage_path).await {
                    tracing::warn!(upload_id = %id, error = %format!("{err:#}"), "Object delete failed, removing metadata anyway");
                }
            }
            None => tracing::warn!(upload_id = %id, "No storage configured, object left in place"),
        }
        self.store.delete_upload(user_id, id).await?;
        tracing::info!(user_id = %user_id, upload_id = %id, "Upload deleted");
        Ok(())
    }

    pub async fn list(&self, user_id: &str, category: Option<&str>) -> AppResult<Vec<Upload>> {
        self.store.list_uploads(user_id, category).await
    }
}
