use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::errors::{PipelineError, PipelineResult};

/// Local blob store fallback. Media lands under the configured upload
/// directory and is referenced by `file://` URI.
#[derive(Clone)]
pub struct BlobUploader {
    upload_dir: PathBuf,
}

impl BlobUploader {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    async fn ensure_dir(&self) -> PipelineResult<()> {
        fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| PipelineError::Media(format!("cannot create upload dir: {e}")))
    }

    /// Write raw bytes under the upload dir and return the blob URI.
    pub async fn save_bytes(&self, file_name: &str, bytes: &[u8]) -> PipelineResult<String> {
        self.ensure_dir().await?;
        let target = self.upload_dir.join(file_name);

        fs::write(&target, bytes)
            .await
            .map_err(|e| PipelineError::Media(format!("write {} failed: {e}", target.display())))?;

        debug!(path = %target.display(), size = bytes.len(), "stored blob");
        Ok(file_uri(&target))
    }

    /// Move a produced local file (e.g. a composed video) into the upload
    /// dir and return the blob URI.
    pub async fn upload_file(&self, source: &Path) -> PipelineResult<String> {
        self.ensure_dir().await?;
        let file_name = source
            .file_name()
            .ok_or_else(|| PipelineError::Media(format!("bad file path {}", source.display())))?;
        let target = self.upload_dir.join(file_name);

        fs::copy(source, &target).await.map_err(|e| {
            PipelineError::Media(format!("copy {} failed: {e}", source.display()))
        })?;

        Ok(file_uri(&target))
    }
}

fn file_uri(path: &Path) -> String {
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}
