use serde::{Deserialize, Serialize};

use super::color;

/// Probabilidad mínima del detector binario para aceptar la imagen.
pub const LEAF_PROBABILITY_THRESHOLD: f32 = 0.5;

/// Mensaje fijo que ve el usuario cuando el filtro rechaza la imagen.
pub const NOT_A_LEAF_MESSAGE: &str =
    "Uploaded image does not appear to contain a tomato leaf. Please upload a clear leaf image.";

/// Qué comprobación tomó la decisión y con qué puntuación.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LeafEvidence {
    /// Detector binario entrenado: P(hoja).
    Detector { probability: f32 },
    /// Heurística de color: proporción de píxeles verdes (None si la imagen está vacía).
    ColorHeuristic { proportion: Option<f64> },
}

/// Resultado del filtro: solo dos estados terminales.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum LeafVerdict {
    Accepted(LeafEvidence),
    Rejected(LeafEvidence),
}

impl LeafVerdict {
    pub fn from_detector(probability: f32) -> Self {
        let evidence = LeafEvidence::Detector { probability };
        if probability >= LEAF_PROBABILITY_THRESHOLD {
            Self::Accepted(evidence)
        } else {
            Self::Rejected(evidence)
        }
    }

    pub fn from_heuristic(proportion: Option<f64>, prop_thresh: f64) -> Self {
        let evidence = LeafEvidence::ColorHeuristic { proportion };
        if color::meets_threshold(proportion, prop_thresh) {
            Self::Accepted(evidence)
        } else {
            Self::Rejected(evidence)
        }
    }

    /// Aceptado como `Ok`, rechazado como `Err`; ambos conservan la evidencia.
    pub fn into_result(self) -> Result<Self, Self> {
        if self.is_accepted() {
            Ok(self)
        } else {
            Err(self)
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn evidence(&self) -> LeafEvidence {
        match self {
            Self::Accepted(e) | Self::Rejected(e) => *e,
        }
    }
}
