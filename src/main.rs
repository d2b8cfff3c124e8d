mod domain;
mod application;
mod adapters;
mod config;

use clap::Parser;
use std::sync::Arc;

use crate::adapters::{
    http::{router, state::HttpState},
    onnx::{
        model_catalog::{ModelSpec, OnnxModelCatalog},
        models::{OnnxDiseaseModel, OnnxLeafDetector},
    },
    storage::{config_file::JsonThresholdStore, debug_log::JsonlDebugLog, uploads::FsUploadStore},
};
use crate::application::ports::{DebugLogPort, DiseaseModelPort, LeafDetectorPort};
use crate::application::services::{
    DiagnosisOptions, DiagnosisService, InferenceGate, PreviewService, ThresholdService,
};
use crate::config::{Cli, DETECTOR_INPUT_SIZE, DISEASE_INPUT_SIZE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Inicializar logs (RUST_LOG=info por defecto)
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    tracing::info!("🔧 Inicializando adaptadores de infraestructura...");

    // 2. Adaptadores
    let uploads = Arc::new(FsUploadStore::new(&cli.upload_dir));
    uploads.ensure_dir().await?;
    tracing::info!("📂 Subidas en '{}'", uploads.root().display());
    let threshold_store = Arc::new(JsonThresholdStore::new(&cli.config_path));
    let debug_log: Option<Arc<dyn DebugLogPort>> = if cli.no_debug_log {
        None
    } else {
        Some(Arc::new(JsonlDebugLog::new(cli.debug_log_path())))
    };

    // 3. Modelos: se cargan una sola vez antes de aceptar peticiones
    let catalog = OnnxModelCatalog::new();
    let disease: Option<Arc<dyn DiseaseModelPort>> = catalog
        .load_optional(&ModelSpec {
            name: "enfermedades",
            path: cli.model_path.clone(),
            input_size: DISEASE_INPUT_SIZE,
            layout: cli.input_layout,
            download_url: cli.model_url.clone(),
        })
        .await
        .map(|engine| Arc::new(OnnxDiseaseModel::new(engine)) as Arc<dyn DiseaseModelPort>);
    let detector: Option<Arc<dyn LeafDetectorPort>> = catalog
        .load_optional(&ModelSpec {
            name: "detector de hojas",
            path: cli.leaf_detector_path.clone(),
            input_size: DETECTOR_INPUT_SIZE,
            layout: cli.input_layout,
            download_url: None,
        })
        .await
        .map(|engine| Arc::new(OnnxLeafDetector::new(engine)) as Arc<dyn LeafDetectorPort>);

    if detector.is_none() {
        tracing::info!("Sin detector de hojas, se usa el filtro de color");
    }

    // 4. Servicios
    let thresholds = Arc::new(ThresholdService::bootstrap(cli.thresholds(), threshold_store).await);
    let preview = Arc::new(PreviewService::new(uploads.clone(), thresholds.clone()));
    let diagnosis = Arc::new(DiagnosisService::new(
        InferenceGate::new(detector),
        disease,
        thresholds.clone(),
        uploads,
        preview.clone(),
        debug_log,
        DiagnosisOptions {
            missing_model_message: cli.missing_model_message(),
            uncertain_below: cli.uncertain_below,
        },
    ));

    if !diagnosis.model_loaded() {
        tracing::warn!("⚠️ Sin modelo de enfermedades: las predicciones responderán con un aviso");
    }

    let state = HttpState {
        diagnosis,
        thresholds,
        preview,
    };

    // 5. Router y servidor
    let app = router(state, &cli.static_dir, &cli.upload_dir);
    let addr = cli.bind_addr();

    tracing::info!("🚀 Servidor iniciado en http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
