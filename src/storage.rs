// src/storage.rs

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::{error::AppError, models::attempt::UploadedFile};

/// File-blob storage collaborator.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Persists the upload and returns the reference to store on the attempt.
    async fn store(&self, file: UploadedFile) -> Result<String, AppError>;

    /// Removes a previously stored file.
    async fn delete(&self, reference: &str) -> Result<(), AppError>;
}

/// Stores uploads on the local disk under `root`, publishing them under `base_url`.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a reference produced by `store` back to its path on disk.
    fn resolve(&self, reference: &str) -> Result<PathBuf, AppError> {
        let name = reference
            .strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| {
                AppError::StorageFailure(format!("'{}' is not a local upload", reference))
            })?;

        let relative = Path::new(name);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if name.is_empty() || !is_plain {
            return Err(AppError::StorageFailure(format!(
                "'{}' is not a valid upload reference",
                reference
            )));
        }

        Ok(self.root.join(relative))
    }
}

/// Keeps a short, safe extension from the client-supplied file name.
fn sanitized_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    let valid = !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, file: UploadedFile) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let stored_name = match sanitized_extension(&file.file_name) {
            Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
            None => uuid::Uuid::new_v4().to_string(),
        };

        tokio::fs::write(self.root.join(&stored_name), &file.bytes).await?;
        tracing::debug!(
            "Stored upload '{}' ({} bytes) as {}",
            file.file_name,
            file.bytes.len(),
            stored_name
        );

        Ok(format!("{}/{}", self.base_url, stored_name))
    }

    async fn delete(&self, reference: &str) -> Result<(), AppError> {
        let path = self.resolve(reference)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Already gone: the reference no longer points at anything to clean up.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("Upload {} was already missing on delete", reference);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
