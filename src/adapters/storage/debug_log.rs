use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::application::ports::{DebugEntry, DebugLogPort};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::upload::secure_filename;

/// Registro JSONL de clasificaciones para revisar predicciones a posteriori.
pub struct JsonlDebugLog {
    path: PathBuf,
    // Serializa los `append` para no intercalar líneas.
    write_lock: Mutex<()>,
}

impl JsonlDebugLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Directorio del registro; las copias de las imágenes van ahí también.
    fn dir(&self) -> PathBuf {
        self.path.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

#[async_trait]
impl DebugLogPort for JsonlDebugLog {
    async fn append(&self, entry: &DebugEntry) -> DomainResult<()> {
        let mut line = serde_json::to_string(entry).map_err(|e| DomainError::OperationFailed(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::OperationFailed(e.to_string()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DomainError::OperationFailed(format!("cannot open {}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| DomainError::OperationFailed(e.to_string()))?;
        file.flush().await.map_err(|e| DomainError::OperationFailed(e.to_string()))
    }

    async fn save_image(&self, filename: &str, bytes: &[u8]) -> DomainResult<()> {
        if filename.is_empty() || secure_filename(filename) != filename {
            return Err(DomainError::InvalidInput(format!("unsafe filename: {filename:?}")));
        }
        let dir = self.dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DomainError::OperationFailed(e.to_string()))?;
        tokio::fs::write(dir.join(filename), bytes)
            .await
            .map_err(|e| DomainError::OperationFailed(format!("cannot write debug copy {filename}: {e}")))
    }
}
