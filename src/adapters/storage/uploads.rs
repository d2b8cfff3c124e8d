use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::application::ports::UploadStorePort;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::upload::secure_filename;

/// Subidas en un directorio plano del disco (servido también como estático).
pub struct FsUploadStore {
    root: PathBuf,
}

impl FsUploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Solo se aceptan nombres que ya estén saneados: nada de rutas relativas.
    fn path_of(&self, filename: &str) -> DomainResult<PathBuf> {
        if filename.is_empty() || secure_filename(filename) != filename {
            return Err(DomainError::InvalidInput(format!("unsafe filename: {filename:?}")));
        }
        Ok(self.root.join(filename))
    }
}

#[async_trait]
impl UploadStorePort for FsUploadStore {
    async fn save(&self, filename: &str, bytes: &[u8]) -> DomainResult<()> {
        let path = self.path_of(filename)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| DomainError::OperationFailed(format!("cannot save {}: {e}", path.display())))
    }

    async fn read(&self, filename: &str) -> DomainResult<Vec<u8>> {
        let path = self.path_of(filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DomainError::NotFound(filename.to_string())),
            Err(e) => Err(DomainError::OperationFailed(format!("cannot read {}: {e}", path.display()))),
        }
    }

    async fn exists(&self, filename: &str) -> bool {
        match self.path_of(filename) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn delete(&self, filename: &str) -> DomainResult<()> {
        let path = self.path_of(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DomainError::OperationFailed(format!("cannot delete {}: {e}", path.display()))),
        }
    }

    async fn save_png(&self, filename: &str, image: &RgbImage) -> DomainResult<()> {
        let mut buf = Cursor::new(Vec::new());
        image
            .write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| DomainError::OperationFailed(format!("cannot encode {filename}: {e}")))?;
        self.save(filename, buf.get_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[tokio::test]
    async fn save_read_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUploadStore::new(dir.path().join("uploads"));
        store.ensure_dir().await.unwrap();

        store.save("leaf.jpg", b"abc").await.unwrap();
        assert!(store.exists("leaf.jpg").await);
        assert_eq!(store.read("leaf.jpg").await.unwrap(), b"abc");

        store.delete("leaf.jpg").await.unwrap();
        assert!(!store.exists("leaf.jpg").await);
        // Borrar dos veces no es un error.
        store.delete("leaf.jpg").await.unwrap();
        assert!(matches!(store.read("leaf.jpg").await, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn refuses_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUploadStore::new(dir.path());
        assert!(store.save("../escape.png", b"x").await.is_err());
        assert!(!store.exists("../escape.png").await);
        assert!(!dir.path().parent().unwrap().join("escape.png").exists());
    }

    #[tokio::test]
    async fn png_is_written_decodable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsUploadStore::new(dir.path());
        let img = RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]));
        store.save_png("x_mask.png", &img).await.unwrap();

        let back = image::open(dir.path().join("x_mask.png")).unwrap().to_rgb8();
        assert_eq!(back, img);
    }
}
