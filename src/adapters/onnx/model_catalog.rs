use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::adapters::onnx::engine::{OnnxImageClassifier, TensorLayout};
use crate::domain::errors::{DomainError, DomainResult};

/// Descripción de un artefacto de modelo opcional en disco.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub name: &'static str,
    pub path: PathBuf,
    pub input_size: u32,
    pub layout: TensorLayout,
    /// URL de descarga si el archivo no está presente.
    pub download_url: Option<String>,
}

/// Localiza, descarga (opcionalmente) y carga los modelos ONNX.
/// La ausencia de un modelo nunca es fatal: se devuelve `None` y el servicio degrada.
pub struct OnnxModelCatalog {
    client: reqwest::Client,
}

impl OnnxModelCatalog {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    pub fn validate_model(&self, path: &Path) -> DomainResult<()> {
        if path.as_os_str().is_empty() {
            return Err(DomainError::InvalidInput("model path empty".into()));
        }
        if !path.is_file() {
            return Err(DomainError::NotFound(format!("model file not found: {}", path.display())));
        }
        Ok(())
    }

    /// Descarga `url` en `dest` pasando por un archivo temporal, para no dejar modelos a medias.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            bail!("descarga fallida, estado {}", resp.status());
        }
        let bytes = resp.bytes().await?;

        let tmp = dest.with_extension("part");
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("escribiendo {}", tmp.display()))?;
        tokio::fs::rename(&tmp, dest).await?;
        Ok(bytes.len() as u64)
    }

    /// Carga el modelo si existe (descargándolo antes si hay URL). Cualquier fallo se registra
    /// y se traduce en `None`.
    pub async fn load_optional(&self, spec: &ModelSpec) -> Option<OnnxImageClassifier> {
        if !spec.path.exists() {
            if let Some(url) = &spec.download_url {
                info!("⬇️ Descargando modelo {} desde {}", spec.name, url);
                match self.download(url, &spec.path).await {
                    Ok(n) => info!("Modelo {} descargado ({} bytes)", spec.name, n),
                    Err(e) => warn!("No se pudo descargar el modelo {}: {:?}", spec.name, e),
                }
            }
        }

        if let Err(e) = self.validate_model(&spec.path) {
            warn!("Modelo {} no disponible: {}", spec.name, e);
            return None;
        }

        let path = spec.path.clone();
        let (size, layout) = (spec.input_size, spec.layout);
        let loaded = tokio::task::spawn_blocking(move || OnnxImageClassifier::load(&path, size, layout)).await;
        match loaded {
            Ok(Ok(engine)) => {
                info!(
                    "✅ Modelo {} cargado desde {} (entrada {}x{})",
                    spec.name,
                    spec.path.display(),
                    engine.input_size(),
                    engine.input_size()
                );
                Some(engine)
            }
            Ok(Err(e)) => {
                warn!("Error cargando el modelo {}: {:?}", spec.name, e);
                None
            }
            Err(e) => {
                warn!("Tarea de carga del modelo {} abortada: {}", spec.name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};

    async fn serve_fixture() -> String {
        let app = Router::new()
            .route("/model.onnx", get(|| async { vec![7u8; 32] }))
            .route("/gone.onnx", get(|| async { StatusCode::NOT_FOUND }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn validate_rejects_empty_and_missing_paths() {
        let catalog = OnnxModelCatalog::new();
        assert!(matches!(catalog.validate_model(Path::new("")), Err(DomainError::InvalidInput(_))));
        assert!(matches!(
            catalog.validate_model(Path::new("/definitely/not/here.onnx")),
            Err(DomainError::NotFound(_))
        ));

        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(catalog.validate_model(file.path()).is_ok());
    }

    #[tokio::test]
    async fn download_writes_the_whole_file() {
        let base = serve_fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("models").join("tomato_model.onnx");

        let n = OnnxModelCatalog::new()
            .download(&format!("{base}/model.onnx"), &dest)
            .await
            .unwrap();
        assert_eq!(n, 32);
        assert_eq!(std::fs::read(&dest).unwrap(), vec![7u8; 32]);
        assert!(!dest.with_extension("part").exists());
    }

    #[tokio::test]
    async fn failed_download_leaves_nothing_and_load_degrades() {
        let base = serve_fixture().await;
        let dir = tempfile::tempdir().unwrap();
        let spec = ModelSpec {
            name: "disease",
            path: dir.path().join("tomato_model.onnx"),
            input_size: 224,
            layout: TensorLayout::Nhwc,
            download_url: Some(format!("{base}/gone.onnx")),
        };

        assert!(OnnxModelCatalog::new().load_optional(&spec).await.is_none());
        assert!(!spec.path.exists());
    }

    #[tokio::test]
    async fn absent_model_without_url_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ModelSpec {
            name: "leaf_detector",
            path: dir.path().join("leaf_detector.onnx"),
            input_size: 128,
            layout: TensorLayout::Nhwc,
            download_url: None,
        };
        assert!(OnnxModelCatalog::new().load_optional(&spec).await.is_none());
    }
}
