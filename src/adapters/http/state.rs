use std::sync::Arc;
use crate::application::services::{DiagnosisService, PreviewService, ThresholdService};

/// Estado compartido para los manejadores HTTP de Axum.
/// Siguiendo la Arquitectura Hexagonal, el estado contiene los servicios (Casos de Uso).
#[derive(Clone)]
pub struct HttpState {
    /// Subida → filtro de hoja → clasificación.
    pub diagnosis: Arc<DiagnosisService>,
    /// Umbrales del filtro de color (panel de administración).
    pub thresholds: Arc<ThresholdService>,
    /// Superposiciones de máscara bajo demanda.
    pub preview: Arc<PreviewService>,
}
