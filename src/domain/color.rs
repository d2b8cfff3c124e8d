//! Filtro heurístico de hoja basado en color.
//!
//! La vista HSV usa la cuantización de 8 bits de Pillow: los tres canales van
//! de 0 a 255 (no 0-360 / 0-1). Los umbrales por defecto están ajustados a esa
//! escala, así que la conversión tiene que reproducirla exactamente.

use image::RgbImage;

use super::thresholds::ThresholdConfig;

/// Píxel HSV cuantizado a 8 bits por canal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hsv8 {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

/// Convierte RGB a HSV de 8 bits.
pub fn rgb_to_hsv8(r: u8, g: u8, b: u8) -> Hsv8 {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    if maxc == minc {
        return Hsv8 { h: 0, s: 0, v: maxc };
    }

    let cr = (maxc - minc) as f32;
    let s = cr / maxc as f32;
    let rc = (maxc - r) as f32 / cr;
    let gc = (maxc - g) as f32 / cr;
    let bc = (maxc - b) as f32 / cr;
    // Las ramas con constante se suman en f64 y se redondean una sola vez a f32.
    let h = if r == maxc {
        bc - gc
    } else if g == maxc {
        (2.0f64 + rc as f64 - bc as f64) as f32
    } else {
        (4.0f64 + gc as f64 - rc as f64) as f32
    };
    // El tono negativo se lleva a [0, 1) sumando una vuelta.
    // Se vuelve a f32 antes de escalar: con f64 puro 2/3 daría 169 en vez de 170.
    let h = ((h as f64 / 6.0 + 1.0) % 1.0) as f32;

    Hsv8 {
        h: clip8((h as f64 * 255.0) as i32),
        s: clip8((s as f64 * 255.0) as i32),
        v: maxc,
    }
}

fn clip8(x: i32) -> u8 {
    x.clamp(0, 255) as u8
}

/// Máscara booleana con las mismas dimensiones que la imagen de origen.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.bits[(y as usize) * (self.width as usize) + x as usize]
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Fracción de píxeles activos; `None` para imágenes vacías.
    pub fn proportion(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.count() as f64 / self.len() as f64)
    }
}

/// Construye la máscara de "verde": tono en [h_min, h_max], s >= s_min, v >= v_min.
pub fn green_mask(image: &RgbImage, cfg: &ThresholdConfig) -> Mask {
    let bits = image
        .pixels()
        .map(|p| {
            let hsv = rgb_to_hsv8(p[0], p[1], p[2]);
            hsv.h >= cfg.h_min && hsv.h <= cfg.h_max && hsv.s >= cfg.s_min && hsv.v >= cfg.v_min
        })
        .collect();
    Mask {
        width: image.width(),
        height: image.height(),
        bits,
    }
}

pub fn green_proportion(image: &RgbImage, cfg: &ThresholdConfig) -> Option<f64> {
    green_mask(image, cfg).proportion()
}

/// `proportion >= prop_thresh`; una proporción indefinida (imagen vacía) nunca pasa.
pub fn meets_threshold(proportion: Option<f64>, prop_thresh: f64) -> bool {
    proportion.is_some_and(|p| p >= prop_thresh)
}

// Formas directas de la decisión. El filtro de la aplicación combina
// `green_proportion` y `meets_threshold` para conservar la proporción medida.

/// Decisión heurística "parece una hoja". Imagen vacía => false.
#[cfg(test)]
pub fn is_leaf(image: &RgbImage, h_min: u8, h_max: u8, s_min: u8, v_min: u8, prop_thresh: f64) -> bool {
    let cfg = ThresholdConfig { h_min, h_max, s_min, v_min, prop_thresh };
    is_leaf_with(image, &cfg)
}

#[cfg(test)]
pub fn is_leaf_with(image: &RgbImage, cfg: &ThresholdConfig) -> bool {
    meets_threshold(green_proportion(image, cfg), cfg.prop_thresh)
}

/// Variante sobre bytes codificados: cualquier fallo de decodificación cuenta como "no es hoja".
#[cfg(test)]
pub fn is_leaf_bytes(bytes: &[u8], cfg: &ThresholdConfig) -> bool {
    image::load_from_memory(bytes).is_ok_and(|img| is_leaf_with(&img.to_rgb8(), cfg))
}
