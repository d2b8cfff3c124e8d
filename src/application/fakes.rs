//! Implementaciones en memoria de los puertos, solo para tests.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};

use crate::application::ports::{
    DebugEntry, DebugLogPort, DiseaseModelPort, LeafDetectorPort, ThresholdStorePort, UploadStorePort,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::thresholds::{ThresholdConfig, ThresholdUpdate};

/// HSV (60, 200, 200).
pub const GREEN: [u8; 3] = [135, 200, 43];
/// HSV (0, 200, 200).
pub const RED: [u8; 3] = [200, 43, 43];

pub fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(w, h, Rgb(rgb))
}

pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("png encode");
    buf.into_inner()
}

pub struct FixedDetector(pub f32);

#[async_trait]
impl LeafDetectorPort for FixedDetector {
    async fn leaf_probability(&self, _image: &RgbImage) -> DomainResult<f32> {
        Ok(self.0)
    }
}

pub struct FailingDetector;

#[async_trait]
impl LeafDetectorPort for FailingDetector {
    async fn leaf_probability(&self, _image: &RgbImage) -> DomainResult<f32> {
        Err(DomainError::OperationFailed("session exploded".into()))
    }
}

pub struct FixedModel(pub Vec<f32>);

#[async_trait]
impl DiseaseModelPort for FixedModel {
    async fn predict(&self, _image: &RgbImage) -> DomainResult<Vec<f32>> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
pub struct MemoryThresholdStore {
    saved: Mutex<Option<ThresholdUpdate>>,
    last_written: Mutex<Option<ThresholdConfig>>,
    fail: bool,
}

impl MemoryThresholdStore {
    pub fn with_saved(update: ThresholdUpdate) -> Self {
        Self {
            saved: Mutex::new(Some(update)),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn saved(&self) -> Option<ThresholdConfig> {
        *self.last_written.lock().unwrap()
    }
}

#[async_trait]
impl ThresholdStorePort for MemoryThresholdStore {
    async fn load(&self) -> DomainResult<Option<ThresholdUpdate>> {
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save(&self, cfg: &ThresholdConfig) -> DomainResult<()> {
        if self.fail {
            return Err(DomainError::OperationFailed("disk full".into()));
        }
        *self.last_written.lock().unwrap() = Some(*cfg);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUploads {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryUploads {
    pub fn contains(&self, name: &str) -> bool {
        self.files.lock().unwrap().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl UploadStorePort for MemoryUploads {
    async fn save(&self, filename: &str, bytes: &[u8]) -> DomainResult<()> {
        self.files.lock().unwrap().insert(filename.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, filename: &str) -> DomainResult<Vec<u8>> {
        self.get(filename)
            .ok_or_else(|| DomainError::NotFound(filename.to_string()))
    }

    async fn exists(&self, filename: &str) -> bool {
        self.contains(filename)
    }

    async fn delete(&self, filename: &str) -> DomainResult<()> {
        self.files.lock().unwrap().remove(filename);
        Ok(())
    }

    async fn save_png(&self, filename: &str, image: &RgbImage) -> DomainResult<()> {
        self.save(filename, &encode_png(image)).await
    }
}

#[derive(Default)]
pub struct MemoryDebugLog {
    entries: Mutex<Vec<DebugEntry>>,
    images: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDebugLog {
    pub fn entries(&self) -> Vec<DebugEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn image(&self, filename: &str) -> Option<Vec<u8>> {
        self.images.lock().unwrap().get(filename).cloned()
    }
}

#[async_trait]
impl DebugLogPort for MemoryDebugLog {
    async fn append(&self, entry: &DebugEntry) -> DomainResult<()> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn save_image(&self, filename: &str, bytes: &[u8]) -> DomainResult<()> {
        self.images.lock().unwrap().insert(filename.to_string(), bytes.to_vec());
        Ok(())
    }
}
