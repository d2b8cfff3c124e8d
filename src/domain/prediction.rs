use serde::{Deserialize, Serialize};

use super::errors::{DomainError, DomainResult};

/// Etiquetas del clasificador de enfermedades. El orden es el del modelo entrenado.
pub const CLASS_LABELS: [&str; 10] = [
    "Bacterial_spot",
    "Early_blight",
    "Late_blight",
    "Leaf_Mold",
    "Septoria_leaf_spot",
    "Spider_mites",
    "Target_Spot",
    "Yellow_Leaf_Curl_Virus",
    "Mosaic_virus",
    "Healthy",
];

pub const NUM_CLASSES: usize = CLASS_LABELS.len();

pub fn describe(label: &str) -> &'static str {
    match label {
        "Bacterial_spot" => "Bacterial spot: small dark spots; remove affected leaves and apply copper-based bactericide.",
        "Early_blight" => "Early blight: brown lesions and concentric rings; practice crop rotation and fungicide spray.",
        "Late_blight" => "Late blight: water-soaked lesions; remove infected plants, use appropriate fungicides.",
        "Leaf_Mold" => "Leaf mold: yellowing and mold under leaves; increase ventilation and use fungicide.",
        "Septoria_leaf_spot" => "Septoria leaf spot: small dark spots; remove debris and apply fungicide.",
        "Spider_mites" => "Spider mites: tiny spots and webbing; use miticides and encourage predators.",
        "Target_Spot" => "Target spot: target-shaped lesions; use disease-free seeds and fungicides.",
        "Yellow_Leaf_Curl_Virus" => "TYLCV: leaf curling and yellowing; control whitefly vector and use resistant varieties.",
        "Mosaic_virus" => "TMV: mottling and stunted growth; remove infected plants and sanitize tools.",
        "Healthy" => "Healthy: no disease detected. Maintain good cultural practices.",
        _ => "No description available.",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedClass {
    pub index: usize,
    pub label: String,
    pub probability: f32,
}

/// Resultado del clasificador de enfermedades.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub class_index: usize,
    pub label: String,
    /// 100 × probabilidad máxima.
    pub confidence: f32,
    pub probabilities: Vec<f32>,
}

impl Prediction {
    /// Construye el resultado a partir del vector de salida del modelo.
    /// Exige exactamente `NUM_CLASSES` valores finitos.
    pub fn from_probabilities(probabilities: Vec<f32>) -> DomainResult<Self> {
        if probabilities.len() != NUM_CLASSES {
            return Err(DomainError::OperationFailed(format!(
                "model returned {} scores, expected {NUM_CLASSES}",
                probabilities.len()
            )));
        }
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(DomainError::OperationFailed("model returned non-finite scores".into()));
        }

        // Primer máximo en caso de empate, como argmax.
        let (class_index, max_p) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        Ok(Self {
            class_index,
            label: CLASS_LABELS[class_index].to_string(),
            confidence: max_p * 100.0,
            probabilities,
        })
    }

    pub fn top_k(&self, k: usize) -> Vec<RankedClass> {
        let mut ranked: Vec<(usize, f32)> = self.probabilities.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(k)
            .map(|(index, probability)| RankedClass {
                index,
                label: CLASS_LABELS[index].to_string(),
                probability,
            })
            .collect()
    }

    pub fn description(&self) -> &'static str {
        describe(&self.label)
    }

    pub fn is_uncertain(&self, floor_percent: f32) -> bool {
        self.confidence < floor_percent
    }

    /// Confianza formateada para las páginas, p. ej. `87.50%`.
    pub fn confidence_display(&self) -> String {
        format!("{:.2}%", self.confidence)
    }
}
