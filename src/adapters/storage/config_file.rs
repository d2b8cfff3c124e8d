use async_trait::async_trait;
use std::path::PathBuf;
use tracing::warn;

use crate::application::ports::ThresholdStorePort;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::thresholds::{ThresholdConfig, ThresholdUpdate};

/// Umbrales persistidos en un objeto JSON plano con las cinco claves.
pub struct JsonThresholdStore {
    path: PathBuf,
}

impl JsonThresholdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ThresholdStorePort for JsonThresholdStore {
    /// Un archivo ilegible o corrupto se trata como vacío.
    async fn load(&self) -> DomainResult<Option<ThresholdUpdate>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("No se pudo leer {}: {e}", self.path.display());
                return Ok(None);
            }
        };

        let parsed = serde_json::from_str::<serde_json::Value>(&raw)
            .map_err(|e| DomainError::InvalidInput(e.to_string()))
            .and_then(|v| ThresholdUpdate::from_json(&v));
        match parsed {
            Ok(update) => Ok(Some(update)),
            Err(e) => {
                warn!("Configuración persistida inválida en {}, se ignora: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    /// Reescribe el archivo completo.
    async fn save(&self, cfg: &ThresholdConfig) -> DomainResult<()> {
        let body = serde_json::to_vec_pretty(cfg).map_err(|e| DomainError::OperationFailed(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DomainError::OperationFailed(format!("cannot create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| DomainError::OperationFailed(format!("error saving config: {e}")))
    }
}
