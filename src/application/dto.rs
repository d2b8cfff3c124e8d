use serde::{Deserialize, Serialize};

use crate::application::services::Diagnosis;
use crate::domain::{gate::LeafVerdict, prediction::RankedClass, thresholds::ThresholdConfig};

/// Respuesta de `/api/predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub filename: String,
    pub prediction: String,
    /// Porcentaje con dos decimales.
    pub confidence: f32,
    pub uncertain: bool,
    pub description: String,
    pub top_k: Vec<RankedClass>,
    pub mask: Option<String>,
    pub leaf_check: LeafVerdict,
}

impl From<Diagnosis> for PredictResponse {
    fn from(d: Diagnosis) -> Self {
        Self {
            confidence: (d.prediction.confidence * 100.0).round() / 100.0,
            description: d.prediction.description().to_string(),
            top_k: d.prediction.top_k(3),
            prediction: d.prediction.label,
            filename: d.filename,
            uncertain: d.uncertain,
            mask: d.mask,
            leaf_check: d.verdict,
        }
    }
}

/// Respuesta de `POST /admin/api`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsSavedResponse {
    pub status: String,
    #[serde(flatten)]
    pub thresholds: ThresholdConfig,
}

impl From<ThresholdConfig> for ThresholdsSavedResponse {
    fn from(thresholds: ThresholdConfig) -> Self {
        Self {
            status: "ok".into(),
            thresholds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self { status: "ok".into() }
    }
}
