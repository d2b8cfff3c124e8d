//! Configuración de arranque: flags de línea de comandos con respaldo en variables de entorno.

use clap::Parser;
use std::path::PathBuf;

use crate::adapters::onnx::engine::TensorLayout;
use crate::domain::thresholds::ThresholdConfig;

/// Lado de entrada del modelo de enfermedades.
pub const DISEASE_INPUT_SIZE: u32 = 224;
/// Lado de entrada del detector binario de hojas.
pub const DETECTOR_INPUT_SIZE: u32 = 128;

#[derive(Debug, Clone, Parser)]
#[command(name = "leafscan", version, about = "Tomato leaf disease detector")]
pub struct Cli {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Directorio de archivos estáticos.
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// Directorio donde se guardan las subidas y sus máscaras.
    #[arg(long, default_value = "static/uploads")]
    pub upload_dir: PathBuf,

    /// Modelo de enfermedades (ONNX, 10 clases).
    #[arg(long, default_value = "models/tomato_model.onnx")]
    pub model_path: PathBuf,

    /// Detector binario opcional de hojas.
    #[arg(long, default_value = "models/leaf_detector.onnx")]
    pub leaf_detector_path: PathBuf,

    /// Si el modelo de enfermedades no existe, se descarga de aquí.
    #[arg(long, env = "MODEL_URL")]
    pub model_url: Option<String>,

    #[arg(long, default_value = "config.json")]
    pub config_path: PathBuf,

    #[arg(long, value_enum, default_value_t = TensorLayout::Nhwc)]
    pub input_layout: TensorLayout,

    /// Confianza (%) por debajo de la cual la predicción se marca como incierta.
    #[arg(long, default_value_t = 50.0)]
    pub uncertain_below: f32,

    #[arg(long)]
    pub no_debug_log: bool,

    #[arg(long = "green-h-min", env = "GREEN_H_MIN", default_value_t = 25)]
    pub h_min: u8,

    #[arg(long = "green-h-max", env = "GREEN_H_MAX", default_value_t = 100)]
    pub h_max: u8,

    #[arg(long = "s-min", env = "S_MIN", default_value_t = 40)]
    pub s_min: u8,

    #[arg(long = "v-min", env = "V_MIN", default_value_t = 40)]
    pub v_min: u8,

    #[arg(long = "green-prop-thresh", env = "GREEN_PROP_THRESH", default_value_t = 0.03, value_parser = parse_fraction)]
    pub prop_thresh: f64,
}

fn parse_fraction(s: &str) -> Result<f64, String> {
    let v: f64 = s.trim().parse().map_err(|e| format!("{s:?} is not a number: {e}"))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("{v} is outside [0, 1]"))
    }
}

impl Cli {
    /// Umbrales de arranque; los valores persistidos los sobrescriben después.
    pub fn thresholds(&self) -> ThresholdConfig {
        ThresholdConfig {
            h_min: self.h_min,
            h_max: self.h_max,
            s_min: self.s_min,
            v_min: self.v_min,
            prop_thresh: self.prop_thresh,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn debug_log_path(&self) -> PathBuf {
        self.upload_dir.join("debug").join("debug_logs.jsonl")
    }

    pub fn missing_model_message(&self) -> String {
        let file = self
            .model_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.model_path.display().to_string());
        format!("Model not found. Please place {file} in the models directory.")
    }
}
