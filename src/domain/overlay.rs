use image::{Rgb, RgbImage};

use super::color::{green_mask, Mask};
use super::errors::{DomainError, DomainResult};
use super::thresholds::ThresholdConfig;

/// Color de resaltado y su opacidad (sobre 255).
pub const HIGHLIGHT: [u8; 3] = [0, 255, 0];
pub const HIGHLIGHT_ALPHA: u8 = 120;

/// Mezcla `HIGHLIGHT` sobre los píxeles activos de la máscara; el resto queda intacto.
/// El resultado ya viene aplanado a RGB (el fondo es opaco).
pub fn render_overlay(image: &RgbImage, mask: &Mask) -> DomainResult<RgbImage> {
    if (mask.width(), mask.height()) != image.dimensions() {
        return Err(DomainError::InvalidInput(format!(
            "mask is {}x{} but image is {}x{}",
            mask.width(),
            mask.height(),
            image.width(),
            image.height()
        )));
    }

    let mut out = image.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        if mask.get(x, y) {
            *px = blend(*px);
        }
    }
    Ok(out)
}

/// Máscara con los umbrales actuales + superposición en una sola llamada.
pub fn mask_overlay_for(image: &RgbImage, cfg: &ThresholdConfig) -> RgbImage {
    let mask = green_mask(image, cfg);
    // Las dimensiones coinciden por construcción.
    render_overlay(image, &mask).unwrap_or_else(|_| image.clone())
}

fn blend(dst: Rgb<u8>) -> Rgb<u8> {
    let a = HIGHLIGHT_ALPHA as u32;
    let mix = |src: u8, dst: u8| ((src as u32 * a + dst as u32 * (255 - a) + 127) / 255) as u8;
    Rgb([
        mix(HIGHLIGHT[0], dst[0]),
        mix(HIGHLIGHT[1], dst[1]),
        mix(HIGHLIGHT[2], dst[2]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_pixels_are_tinted_and_others_untouched() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([200, 43, 43]));
        img.put_pixel(1, 1, Rgb([135, 200, 43]));
        let cfg = ThresholdConfig::default();
        let mask = green_mask(&img, &cfg);

        let out = render_overlay(&img, &mask).unwrap();
        for (x, y, px) in out.enumerate_pixels() {
            if (x, y) == (1, 1) {
                assert_ne!(*px, Rgb([135, 200, 43]));
            } else {
                assert_eq!(*px, Rgb([200, 43, 43]));
            }
        }
        // (0*120 + 135*135 + 127)/255 = 71, (255*120 + 200*135 + 127)/255 = 226, (43*135 + 127)/255 = 23
        assert_eq!(*out.get_pixel(1, 1), Rgb([71, 226, 23]));
    }

    #[test]
    fn blending_black_and_white_uses_fixed_alpha() {
        assert_eq!(blend(Rgb([0, 0, 0])), Rgb([0, 120, 0]));
        assert_eq!(blend(Rgb([255, 255, 255])), Rgb([135, 255, 135]));
    }

    #[test]
    fn empty_mask_returns_identical_image() {
        let img = RgbImage::from_pixel(3, 3, Rgb([10, 10, 10]));
        let out = mask_overlay_for(&img, &ThresholdConfig::default());
        assert_eq!(out, img);
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let img = RgbImage::new(2, 2);
        let mask = green_mask(&RgbImage::new(3, 3), &ThresholdConfig::default());
        assert!(matches!(render_overlay(&img, &mask), Err(DomainError::InvalidInput(_))));
    }
}
