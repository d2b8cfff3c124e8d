use anyhow::{anyhow, Result};
use clap::ValueEnum;
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::Value;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

/// Disposición del tensor de entrada. Los modelos exportados desde Keras esperan NHWC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TensorLayout {
    Nhwc,
    Nchw,
}

/// Redimensiona a `size`×`size`, escala a [0, 1] y añade la dimensión de lote.
/// Devuelve la forma y los datos planos listos para `ort`.
pub fn image_to_tensor(rgb: &RgbImage, size: u32, layout: TensorLayout) -> (Vec<i64>, Vec<f32>) {
    let resized = image::imageops::resize(rgb, size, size, FilterType::CatmullRom);
    let s = size as usize;

    let mut input = match layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, s, s, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, s, s)),
    };
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0;
            match layout {
                TensorLayout::Nhwc => input[[0, y, x, c]] = v,
                TensorLayout::Nchw => input[[0, c, y, x]] = v,
            }
        }
    }

    let shape = input.shape().iter().map(|&d| d as i64).collect();
    let (data, _) = input.into_raw_vec_and_offset();
    (shape, data)
}

/// Sesión ONNX de clasificación de imágenes con entrada cuadrada.
pub struct OnnxImageClassifier {
    session: Mutex<Session>,
    input_size: u32,
    layout: TensorLayout,
}

impl OnnxImageClassifier {
    pub fn load(path: &Path, input_size: u32, layout: TensorLayout) -> Result<Self> {
        let mut builder = Session::builder()?.with_intra_threads(4)?;

        // CUDA es opcional: si está disponible se registra, si no continuamos en CPU.
        let cuda = CUDAExecutionProvider::default().build();
        if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda]) {
            builder = builder_with_cuda;
        }

        let model_bytes = fs::read(path)?;
        let session = builder.commit_from_memory(&model_bytes)?;

        Ok(Self {
            session: Mutex::new(session),
            input_size,
            layout,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Ejecuta el modelo y devuelve la primera salida aplanada.
    pub fn run(&self, rgb: &RgbImage) -> Result<Vec<f32>> {
        let (shape, data) = image_to_tensor(rgb, self.input_size, self.layout);
        let input_tensor = Value::from_array((shape, data))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("sesión ONNX envenenada por un pánico previo"))?;
        let outputs = session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;
        tracing::debug!("Salida ONNX con forma {:?}", shape_out);

        Ok(data_out.to_vec())
    }
}
