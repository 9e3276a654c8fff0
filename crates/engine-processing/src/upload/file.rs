use super::Uploader;
use crate::{error::UploadError, item::BatchPayload};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Persists each payload as `batch-<n>.json` in one directory.
#[derive(Debug, Clone)]
pub struct FileBatchWriter {
    directory: PathBuf,
}

impl FileBatchWriter {
    pub async fn create(directory: impl AsRef<Path>) -> Result<Self, UploadError> {
        let directory = directory.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| UploadError::Directory {
                path: directory.clone(),
                source,
            })?;
        Ok(FileBatchWriter { directory })
    }

    pub fn path_for(&self, batch_number: u64) -> PathBuf {
        self.directory.join(format!("batch-{batch_number:06}.json"))
    }
}

#[async_trait]
impl Uploader for FileBatchWriter {
    fn name(&self) -> &str {
        "file"
    }

    async fn upload(&self, payload: &BatchPayload) -> Result<(), UploadError> {
        let path = self.path_for(payload.batch_number);
        tokio::fs::write(&path, &payload.content)
            .await
            .map_err(|source| UploadError::File {
                batch_number: payload.batch_number,
                path: path.clone(),
                source,
            })?;
        trace!(path = %path.display(), "Saved batch file");
        Ok(())
    }
}
