use async_trait::async_trait;
use image::RgbImage;
use std::sync::Arc;

use crate::adapters::onnx::engine::OnnxImageClassifier;
use crate::application::ports::{DiseaseModelPort, LeafDetectorPort};
use crate::domain::errors::{DomainError, DomainResult};

/// La inferencia es CPU intensiva: se saca del runtime async.
async fn run_blocking(engine: Arc<OnnxImageClassifier>, image: &RgbImage) -> DomainResult<Vec<f32>> {
    let image = image.clone();
    tokio::task::spawn_blocking(move || engine.run(&image))
        .await
        .map_err(|e| DomainError::OperationFailed(format!("inference task failed: {e}")))?
        .map_err(|e| DomainError::OperationFailed(format!("inference failed: {e}")))
}

/// Detector binario hoja / no-hoja (salida sigmoide de un solo valor).
pub struct OnnxLeafDetector {
    engine: Arc<OnnxImageClassifier>,
}

impl OnnxLeafDetector {
    pub fn new(engine: OnnxImageClassifier) -> Self {
        Self { engine: Arc::new(engine) }
    }
}

#[async_trait]
impl LeafDetectorPort for OnnxLeafDetector {
    async fn leaf_probability(&self, image: &RgbImage) -> DomainResult<f32> {
        let scores = run_blocking(self.engine.clone(), image).await?;
        match scores.first() {
            Some(p) if p.is_finite() => Ok(*p),
            Some(p) => Err(DomainError::OperationFailed(format!("leaf detector returned {p}"))),
            None => Err(DomainError::OperationFailed("leaf detector returned no output".into())),
        }
    }
}

/// Clasificador multiclase de enfermedades.
pub struct OnnxDiseaseModel {
    engine: Arc<OnnxImageClassifier>,
}

impl OnnxDiseaseModel {
    pub fn new(engine: OnnxImageClassifier) -> Self {
        Self { engine: Arc::new(engine) }
    }
}

#[async_trait]
impl DiseaseModelPort for OnnxDiseaseModel {
    async fn predict(&self, image: &RgbImage) -> DomainResult<Vec<f32>> {
        run_blocking(self.engine.clone(), image).await
    }
}
