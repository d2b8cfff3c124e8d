use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::domain::{
    errors::DomainResult,
    thresholds::{ThresholdConfig, ThresholdUpdate},
};

/// Detector binario opcional hoja / no-hoja.
#[async_trait]
pub trait LeafDetectorPort: Send + Sync {
    /// P(hoja) en [0, 1].
    async fn leaf_probability(&self, image: &RgbImage) -> DomainResult<f32>;
}

/// Clasificador de enfermedades preentrenado.
#[async_trait]
pub trait DiseaseModelPort: Send + Sync {
    /// Vector de probabilidades en el orden de `CLASS_LABELS`.
    async fn predict(&self, image: &RgbImage) -> DomainResult<Vec<f32>>;
}

/// Persistencia de los umbrales ajustados desde el panel de administración.
#[async_trait]
pub trait ThresholdStorePort: Send + Sync {
    /// Valores persistidos (posiblemente parciales); `None` si no hay nada guardado.
    async fn load(&self) -> DomainResult<Option<ThresholdUpdate>>;
    async fn save(&self, cfg: &ThresholdConfig) -> DomainResult<()>;
}

/// Almacén de imágenes subidas y de sus superposiciones.
#[async_trait]
pub trait UploadStorePort: Send + Sync {
    async fn save(&self, filename: &str, bytes: &[u8]) -> DomainResult<()>;
    async fn read(&self, filename: &str) -> DomainResult<Vec<u8>>;
    async fn exists(&self, filename: &str) -> bool;
    async fn delete(&self, filename: &str) -> DomainResult<()>;
    async fn save_png(&self, filename: &str, image: &RgbImage) -> DomainResult<()>;
}

/// Registro de diagnóstico (una línea JSON por clasificación).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugEntry {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub filename: String,
    pub prediction: String,
    pub confidence: f32,
    pub uncertain: bool,
    pub raw_predictions: Vec<f32>,
}

#[async_trait]
pub trait DebugLogPort: Send + Sync {
    async fn append(&self, entry: &DebugEntry) -> DomainResult<()>;
    /// Guarda una copia de la imagen clasificada junto al registro, bajo `filename`.
    async fn save_image(&self, filename: &str, bytes: &[u8]) -> DomainResult<()>;
}
