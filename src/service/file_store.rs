use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::error::ServiceError;
use crate::models::ticketmodel::NewAttachment;

/// A document received in a multipart submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    upload_dir: PathBuf,
}

impl FileStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        FileStore {
            upload_dir: upload_dir.into(),
        }
    }

    /// Writes the bytes under a fresh name and returns the attachment record
    /// to persist alongside the ticket.
    pub async fn save(&self, file: &UploadedFile) -> Result<NewAttachment, ServiceError> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| ServiceError::FileStore(format!("Failed to create upload directory: {}", e)))?;

        let stored_name = match file.extension() {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.upload_dir.join(stored_name);

        tokio::fs::write(&path, &file.bytes)
            .await
            .map_err(|e| ServiceError::FileStore(format!("Failed to store file: {}", e)))?;

        tracing::debug!("Stored upload {} at {}", file.filename, path.display());

        Ok(NewAttachment {
            filename: file.filename.clone(),
            path: path.to_string_lossy().into_owned(),
            mimetype: file.content_type.clone(),
        })
    }

    /// Best-effort removal; a file that is already gone is not an error.
    pub async fn remove(&self, path: &str) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed stored file {}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove stored file {}: {}", path, e),
        }
    }
}
