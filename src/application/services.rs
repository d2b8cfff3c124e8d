use std::sync::Arc;

use image::RgbImage;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    application::ports::{
        DebugEntry, DebugLogPort, DiseaseModelPort, LeafDetectorPort, ThresholdStorePort, UploadStorePort,
    },
    domain::{
        color,
        errors::{DomainError, DomainResult},
        gate::LeafVerdict,
        overlay,
        prediction::Prediction,
        thresholds::{ThresholdConfig, ThresholdUpdate},
        upload,
    },
};

/// Ejecuta trabajo de CPU (decodificación, heurística) fuera del runtime async.
async fn blocking<T, F>(f: F) -> DomainResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DomainError::OperationFailed(format!("worker task failed: {e}")))
}

/// Dueño único de los umbrales del filtro de color.
/// Las escrituras se serializan con el `RwLock` y se persisten antes de publicarse.
pub struct ThresholdService {
    current: RwLock<ThresholdConfig>,
    store: Arc<dyn ThresholdStorePort>,
}

impl ThresholdService {
    /// Parte de `base` (valores por defecto + entorno) y aplica encima lo persistido.
    pub async fn bootstrap(base: ThresholdConfig, store: Arc<dyn ThresholdStorePort>) -> Self {
        let cfg = match store.load().await {
            Ok(Some(saved)) => {
                info!("Umbrales persistidos cargados: {:?}", saved);
                base.apply(&saved)
            }
            Ok(None) => base,
            Err(e) => {
                warn!("No se pudieron leer los umbrales persistidos, se usan los de arranque: {e}");
                base
            }
        };
        Self {
            current: RwLock::new(cfg),
            store,
        }
    }

    pub async fn current(&self) -> ThresholdConfig {
        *self.current.read().await
    }

    /// Aplica una actualización parcial y la persiste completa.
    /// Si falla la escritura, la configuración anterior sigue vigente.
    pub async fn update(&self, update: ThresholdUpdate) -> DomainResult<ThresholdConfig> {
        let mut guard = self.current.write().await;
        let next = guard.apply(&update);
        self.store.save(&next).await?;
        *guard = next;
        info!("Umbrales actualizados: {:?}", next);
        Ok(next)
    }
}

/// Filtro previo a la inferencia: detector binario si existe, heurística de color si no
/// (o si el detector falla).
pub struct InferenceGate {
    detector: Option<Arc<dyn LeafDetectorPort>>,
}

impl InferenceGate {
    pub fn new(detector: Option<Arc<dyn LeafDetectorPort>>) -> Self {
        Self { detector }
    }

    pub async fn evaluate(&self, image: &RgbImage, cfg: &ThresholdConfig) -> LeafVerdict {
        if let Some(detector) = &self.detector {
            match detector.leaf_probability(image).await {
                Ok(p) => return LeafVerdict::from_detector(p),
                Err(e) => warn!("Detector de hojas falló, se usa la heurística de color: {e}"),
            }
        }

        let img = image.clone();
        let cfg = *cfg;
        match blocking(move || color::green_proportion(&img, &cfg)).await {
            Ok(proportion) => LeafVerdict::from_heuristic(proportion, cfg.prop_thresh),
            Err(e) => {
                warn!("Heurística de color no disponible: {e}");
                LeafVerdict::from_heuristic(None, cfg.prop_thresh)
            }
        }
    }

    /// `Ok` si la imagen puede pasar al clasificador, `Err` con la evidencia del rechazo.
    pub async fn accept_for_inference(&self, image: &RgbImage, cfg: &ThresholdConfig) -> Result<LeafVerdict, LeafVerdict> {
        self.evaluate(image, cfg).await.into_result()
    }

    /// Decodifica la subida y la pasa por el filtro. Lo que no se decodifica se rechaza
    /// sin consultar al detector.
    pub async fn admit(&self, bytes: Vec<u8>, cfg: &ThresholdConfig) -> Result<(RgbImage, LeafVerdict), LeafVerdict> {
        let undecodable = LeafVerdict::from_heuristic(None, cfg.prop_thresh);
        let image = match blocking(move || image::load_from_memory(&bytes).map(|img| img.to_rgb8())).await {
            Ok(Ok(img)) => img,
            Ok(Err(e)) => {
                info!("Subida no decodificable, se rechaza: {e}");
                return Err(undecodable);
            }
            Err(e) => {
                warn!("No se pudo decodificar la subida: {e}");
                return Err(undecodable);
            }
        };
        let verdict = self.accept_for_inference(&image, cfg).await?;
        Ok((image, verdict))
    }
}

/// Genera las superposiciones de máscara junto a las subidas.
pub struct PreviewService {
    uploads: Arc<dyn UploadStorePort>,
    thresholds: Arc<ThresholdService>,
}

impl PreviewService {
    pub fn new(uploads: Arc<dyn UploadStorePort>, thresholds: Arc<ThresholdService>) -> Self {
        Self { uploads, thresholds }
    }

    /// Devuelve el nombre de la superposición de `filename`, creándola si aún no existe.
    pub async fn ensure_mask(&self, filename: &str) -> DomainResult<String> {
        if upload::secure_filename(filename) != filename || !self.uploads.exists(filename).await {
            return Err(DomainError::NotFound("File not found".into()));
        }

        let mask_name = upload::mask_name_for(filename);
        if self.uploads.exists(&mask_name).await {
            return Ok(mask_name);
        }

        let bytes = self.uploads.read(filename).await?;
        let image = blocking(move || image::load_from_memory(&bytes).map(|img| img.to_rgb8()))
            .await?
            .map_err(|e| DomainError::OperationFailed(format!("cannot decode {filename}: {e}")))?;
        self.render_mask(filename, image).await
    }

    /// Renderiza (o sobrescribe) la superposición con los umbrales actuales.
    pub async fn render_mask(&self, filename: &str, image: RgbImage) -> DomainResult<String> {
        let cfg = self.thresholds.current().await;
        let overlay = blocking(move || overlay::mask_overlay_for(&image, &cfg)).await?;
        let mask_name = upload::mask_name_for(filename);
        self.uploads.save_png(&mask_name, &overlay).await?;
        debug!("Superposición generada: {mask_name}");
        Ok(mask_name)
    }
}

/// Resultado completo del flujo subida → filtro → clasificación.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub filename: String,
    pub verdict: LeafVerdict,
    pub prediction: Prediction,
    pub uncertain: bool,
    pub mask: Option<String>,
}

/// Opciones del servicio de diagnóstico.
#[derive(Debug, Clone)]
pub struct DiagnosisOptions {
    /// Mensaje cuando no hay modelo de enfermedades cargado.
    pub missing_model_message: String,
    /// Confianza (en %) por debajo de la cual el resultado se marca como incierto.
    pub uncertain_below: f32,
}

/// Orquestador del caso de uso principal.
pub struct DiagnosisService {
    gate: InferenceGate,
    disease: Option<Arc<dyn DiseaseModelPort>>,
    thresholds: Arc<ThresholdService>,
    uploads: Arc<dyn UploadStorePort>,
    preview: Arc<PreviewService>,
    debug_log: Option<Arc<dyn DebugLogPort>>,
    options: DiagnosisOptions,
}

impl DiagnosisService {
    pub fn new(
        gate: InferenceGate,
        disease: Option<Arc<dyn DiseaseModelPort>>,
        thresholds: Arc<ThresholdService>,
        uploads: Arc<dyn UploadStorePort>,
        preview: Arc<PreviewService>,
        debug_log: Option<Arc<dyn DebugLogPort>>,
        options: DiagnosisOptions,
    ) -> Self {
        Self {
            gate,
            disease,
            thresholds,
            uploads,
            preview,
            debug_log,
            options,
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.disease.is_some()
    }

    /// Clasifica una imagen ya decodificada.
    pub async fn classify(&self, image: &RgbImage) -> DomainResult<Prediction> {
        let model = self
            .disease
            .as_ref()
            .ok_or_else(|| DomainError::ModelUnavailable(self.options.missing_model_message.clone()))?;
        let probabilities = model.predict(image).await?;
        Prediction::from_probabilities(probabilities)
    }

    /// Flujo completo de una subida. Las imágenes rechazadas se borran del disco.
    pub async fn diagnose_upload(&self, original_name: &str, bytes: Vec<u8>, endpoint: &str) -> DomainResult<Diagnosis> {
        let filename = upload::accept_upload_name(original_name)?;
        self.uploads.save(&filename, &bytes).await?;

        // Copia para el directorio de depuración, solo si el registro está activo.
        let debug_copy = self.debug_log.as_ref().map(|_| bytes.clone());

        let cfg = self.thresholds.current().await;
        let (image, verdict) = match self.gate.admit(bytes, &cfg).await {
            Ok(admitted) => admitted,
            Err(rejected) => {
                info!("Subida {filename} rechazada por el filtro de hoja: {:?}", rejected.evidence());
                self.discard(&filename).await;
                return Err(DomainError::NotALeaf);
            }
        };

        let prediction = self.classify(&image).await?;
        let uncertain = prediction.is_uncertain(self.options.uncertain_below);
        info!(
            "Diagnóstico {filename}: {} ({})",
            prediction.label,
            prediction.confidence_display()
        );

        let mask = match self.preview.render_mask(&filename, image).await {
            Ok(name) => Some(name),
            Err(e) => {
                warn!("No se pudo generar la superposición de {filename}: {e}");
                None
            }
        };

        self.record(endpoint, &filename, &prediction, uncertain, debug_copy).await;

        Ok(Diagnosis {
            filename,
            verdict,
            prediction,
            uncertain,
            mask,
        })
    }

    async fn discard(&self, filename: &str) {
        if let Err(e) = self.uploads.delete(filename).await {
            warn!("No se pudo borrar la subida rechazada {filename}: {e}");
        }
    }

    async fn record(
        &self,
        endpoint: &str,
        filename: &str,
        prediction: &Prediction,
        uncertain: bool,
        image_bytes: Option<Vec<u8>>,
    ) {
        let Some(log) = &self.debug_log else { return };
        if let Some(bytes) = image_bytes {
            if let Err(e) = log.save_image(filename, &bytes).await {
                warn!("No se pudo guardar la copia de depuración de {filename}: {e}");
            }
        }
        let entry = DebugEntry {
            timestamp: chrono::Utc::now(),
            endpoint: endpoint.to_string(),
            filename: filename.to_string(),
            prediction: prediction.label.clone(),
            confidence: prediction.confidence,
            uncertain,
            raw_predictions: prediction.probabilities.clone(),
        };
        if let Err(e) = log.append(&entry).await {
            warn!("No se pudo escribir el registro de depuración: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::fakes::{
        encode_png, solid, FailingDetector, FixedDetector, FixedModel, MemoryDebugLog, MemoryThresholdStore,
        MemoryUploads, GREEN, RED,
    };
    use crate::domain::gate::LeafEvidence;
    use crate::domain::prediction::NUM_CLASSES;

    const MISSING: &str = "Model not found. Please place tomato_model.onnx in the models directory.";

    struct Harness {
        uploads: Arc<MemoryUploads>,
        log: Arc<MemoryDebugLog>,
        service: DiagnosisService,
    }

    async fn harness(detector: Option<Arc<dyn LeafDetectorPort>>, model: Option<Arc<dyn DiseaseModelPort>>) -> Harness {
        let uploads = Arc::new(MemoryUploads::default());
        let log = Arc::new(MemoryDebugLog::default());
        let thresholds = Arc::new(
            ThresholdService::bootstrap(ThresholdConfig::default(), Arc::new(MemoryThresholdStore::default())).await,
        );
        let preview = Arc::new(PreviewService::new(uploads.clone(), thresholds.clone()));
        let service = DiagnosisService::new(
            InferenceGate::new(detector),
            model,
            thresholds,
            uploads.clone(),
            preview,
            Some(log.clone()),
            DiagnosisOptions {
                missing_model_message: MISSING.into(),
                uncertain_below: 50.0,
            },
        );
        Harness { uploads, log, service }
    }

    fn one_hot(idx: usize, p: f32) -> Vec<f32> {
        let mut v = vec![(1.0 - p) / (NUM_CLASSES - 1) as f32; NUM_CLASSES];
        v[idx] = p;
        v
    }

    #[tokio::test]
    async fn green_leaf_is_classified_and_logged() {
        let h = harness(None, Some(Arc::new(FixedModel(one_hot(1, 0.8))))).await;
        let d = h
            .service
            .diagnose_upload("leaf.png", encode_png(&solid(8, 8, GREEN)), "/api/predict")
            .await
            .unwrap();

        assert_eq!(d.filename, "leaf.png");
        assert_eq!(d.prediction.label, "Early_blight");
        assert!(!d.uncertain);
        assert_eq!(d.mask.as_deref(), Some("leaf_mask.png"));
        assert!(matches!(d.verdict, LeafVerdict::Accepted(LeafEvidence::ColorHeuristic { .. })));
        assert!(h.uploads.contains("leaf.png"));
        assert!(h.uploads.contains("leaf_mask.png"));

        let entries = h.log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].endpoint, "/api/predict");
        assert_eq!(entries[0].raw_predictions.len(), NUM_CLASSES);
        assert_eq!(h.log.image("leaf.png"), Some(encode_png(&solid(8, 8, GREEN))));
    }

    #[tokio::test]
    async fn red_image_is_rejected_and_deleted() {
        let h = harness(None, Some(Arc::new(FixedModel(one_hot(0, 0.9))))).await;
        let err = h
            .service
            .diagnose_upload("apple.jpg", encode_png(&solid(8, 8, RED)), "/")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotALeaf));
        assert!(!h.uploads.contains("apple.jpg"));
        assert!(h.log.entries().is_empty());
        assert!(h.log.image("apple.jpg").is_none());
    }

    #[tokio::test]
    async fn corrupt_and_empty_uploads_are_rejected_without_panicking() {
        let h = harness(None, Some(Arc::new(FixedModel(one_hot(0, 0.9))))).await;
        for bytes in [Vec::new(), b"\x89PNG broken".to_vec()] {
            let err = h.service.diagnose_upload("x.png", bytes, "/").await.unwrap_err();
            assert!(matches!(err, DomainError::NotALeaf));
            assert!(!h.uploads.contains("x.png"));
        }
    }

    #[tokio::test]
    async fn missing_model_reports_user_message() {
        let h = harness(None, None).await;
        let err = h
            .service
            .diagnose_upload("leaf.png", encode_png(&solid(8, 8, GREEN)), "/")
            .await
            .unwrap_err();
        match err {
            DomainError::ModelUnavailable(msg) => assert_eq!(msg, MISSING),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!h.service.model_loaded());
    }

    #[tokio::test]
    async fn invalid_names_have_no_side_effects() {
        let h = harness(None, Some(Arc::new(FixedModel(one_hot(0, 0.9))))).await;
        let err = h.service.diagnose_upload("notes.txt", vec![1, 2, 3], "/").await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(_)));
        assert!(h.uploads.is_empty());
    }

    #[tokio::test]
    async fn detector_decides_before_heuristic() {
        // El detector rechaza aunque la imagen sea verde.
        let h = harness(Some(Arc::new(FixedDetector(0.2))), Some(Arc::new(FixedModel(one_hot(0, 0.9))))).await;
        let err = h
            .service
            .diagnose_upload("leaf.png", encode_png(&solid(8, 8, GREEN)), "/")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotALeaf));

        // Y acepta aunque sea roja.
        let h = harness(Some(Arc::new(FixedDetector(0.5))), Some(Arc::new(FixedModel(one_hot(9, 0.3))))).await;
        let d = h
            .service
            .diagnose_upload("tomato.png", encode_png(&solid(8, 8, RED)), "/")
            .await
            .unwrap();
        assert!(matches!(d.verdict, LeafVerdict::Accepted(LeafEvidence::Detector { .. })));
        assert_eq!(d.prediction.label, "Healthy");
        assert!(d.uncertain);
    }

    #[tokio::test]
    async fn failing_detector_falls_back_to_heuristic() {
        let gate = InferenceGate::new(Some(Arc::new(FailingDetector)));
        let cfg = ThresholdConfig::default();
        let green = gate.evaluate(&solid(4, 4, GREEN), &cfg).await;
        assert!(matches!(green, LeafVerdict::Accepted(LeafEvidence::ColorHeuristic { proportion: Some(p) }) if p == 1.0));
        assert!(gate.accept_for_inference(&solid(4, 4, RED), &cfg).await.is_err());
    }

    #[tokio::test]
    async fn gate_rejects_empty_image() {
        let gate = InferenceGate::new(None);
        let rejected = gate
            .accept_for_inference(&RgbImage::new(0, 0), &ThresholdConfig::default())
            .await
            .unwrap_err();
        assert_eq!(rejected.evidence(), LeafEvidence::ColorHeuristic { proportion: None });
    }

    #[tokio::test]
    async fn undecodable_bytes_skip_the_detector() {
        // Un detector que aceptaría cualquier cosa no llega a verlas.
        let gate = InferenceGate::new(Some(Arc::new(FixedDetector(1.0))));
        let cfg = ThresholdConfig::default();
        for bytes in [Vec::new(), b"GIF89a nope".to_vec()] {
            let rejected = gate.admit(bytes, &cfg).await.unwrap_err();
            assert_eq!(rejected.evidence(), LeafEvidence::ColorHeuristic { proportion: None });
        }

        let (image, verdict) = gate.admit(encode_png(&solid(3, 3, RED)), &cfg).await.unwrap();
        assert_eq!(image.dimensions(), (3, 3));
        assert!(matches!(verdict, LeafVerdict::Accepted(LeafEvidence::Detector { .. })));
    }

    #[tokio::test]
    async fn model_with_wrong_arity_is_an_operation_error() {
        let h = harness(None, Some(Arc::new(FixedModel(vec![0.5, 0.5])))).await;
        let err = h.service.classify(&solid(2, 2, GREEN)).await.unwrap_err();
        assert!(matches!(err, DomainError::OperationFailed(_)));
    }

    #[tokio::test]
    async fn threshold_updates_round_trip_and_persist() {
        let store = Arc::new(MemoryThresholdStore::default());
        let svc = ThresholdService::bootstrap(ThresholdConfig::default(), store.clone()).await;

        let posted = ThresholdUpdate {
            h_min: Some(30),
            h_max: Some(90),
            s_min: Some(50),
            v_min: Some(60),
            prop_thresh: Some(0.1),
        };
        let cfg = svc.update(posted).await.unwrap();
        assert_eq!(svc.current().await, cfg);
        assert_eq!(
            (cfg.h_min, cfg.h_max, cfg.s_min, cfg.v_min, cfg.prop_thresh),
            (30, 90, 50, 60, 0.1)
        );
        assert_eq!(store.saved(), Some(cfg));

        let cfg = svc
            .update(ThresholdUpdate {
                v_min: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!((cfg.h_min, cfg.h_max, cfg.s_min, cfg.v_min), (30, 90, 50, 10));
    }

    #[tokio::test]
    async fn persisted_values_win_over_startup_values() {
        let store = Arc::new(MemoryThresholdStore::with_saved(ThresholdUpdate {
            s_min: Some(99),
            ..Default::default()
        }));
        let base = ThresholdConfig {
            s_min: 10,
            v_min: 11,
            ..Default::default()
        };
        let svc = ThresholdService::bootstrap(base, store).await;
        let cfg = svc.current().await;
        assert_eq!(cfg.s_min, 99);
        assert_eq!(cfg.v_min, 11);
    }

    #[tokio::test]
    async fn failed_persist_keeps_previous_config() {
        let store = Arc::new(MemoryThresholdStore::failing());
        let svc = ThresholdService::bootstrap(ThresholdConfig::default(), store).await;
        let res = svc
            .update(ThresholdUpdate {
                h_min: Some(1),
                ..Default::default()
            })
            .await;
        assert!(res.is_err());
        assert_eq!(svc.current().await, ThresholdConfig::default());
    }

    #[tokio::test]
    async fn preview_generates_mask_once_and_rejects_unknown_files() {
        let uploads = Arc::new(MemoryUploads::default());
        let thresholds =
            Arc::new(ThresholdService::bootstrap(ThresholdConfig::default(), Arc::new(MemoryThresholdStore::default())).await);
        let preview = PreviewService::new(uploads.clone(), thresholds);

        assert!(matches!(preview.ensure_mask("ghost.png").await, Err(DomainError::NotFound(_))));
        assert!(matches!(preview.ensure_mask("../secret.png").await, Err(DomainError::NotFound(_))));

        uploads.save("leaf.jpg", &encode_png(&solid(4, 4, GREEN))).await.unwrap();
        assert_eq!(preview.ensure_mask("leaf.jpg").await.unwrap(), "leaf_mask.png");
        let first = uploads.get("leaf_mask.png").unwrap();
        let overlay = image::load_from_memory(&first).unwrap().to_rgb8();
        assert_ne!(*overlay.get_pixel(0, 0), image::Rgb(GREEN));

        // Si ya existe no se regenera.
        uploads.save("leaf_mask.png", b"cached").await.unwrap();
        assert_eq!(preview.ensure_mask("leaf.jpg").await.unwrap(), "leaf_mask.png");
        assert_eq!(uploads.get("leaf_mask.png").unwrap(), b"cached".to_vec());
    }
}
