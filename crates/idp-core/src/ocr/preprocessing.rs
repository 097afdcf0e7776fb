//! Image preprocessing for OCR.
//!
//! Fixed order: grayscale, CLAHE, optional median denoise, adaptive
//! binarization, upscaling. The contrast steps work on luminance, so they only
//! run when grayscale conversion is enabled.

use image::error::{ParameterError, ParameterErrorKind};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, ImageError, Luma};
use tracing::{debug, warn};

use crate::models::config::{DenoiseMode, PreprocessConfig, ThresholdMode};

/// Binarize in `auto` mode only below this mean brightness...
const AUTO_MAX_MEAN: f32 = 170.0;
/// ...and above this brightness standard deviation.
const AUTO_MIN_STD: f32 = 40.0;

const THRESHOLD_BLOCK: u32 = 15;
const THRESHOLD_C: i32 = 5;

/// Image preprocessor for the OCR pipeline.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Preprocess an image. Never fails: on any error the original image is
    /// returned (as RGB) and a warning is logged.
    pub fn preprocess(&self, image: &DynamicImage) -> DynamicImage {
        match self.try_preprocess(image) {
            Ok(processed) => processed,
            Err(e) => {
                warn!("Preprocessing failed, using original image: {}", e);
                DynamicImage::ImageRgb8(image.to_rgb8())
            }
        }
    }

    /// Preprocess an image, reporting failures.
    pub fn try_preprocess(&self, image: &DynamicImage) -> Result<DynamicImage, ImageError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }

        if !self.config.enabled {
            return Ok(DynamicImage::ImageRgb8(image.to_rgb8()));
        }

        let mut processed = if self.config.grayscale {
            let mut gray = image.to_luma8();

            if self.config.clahe {
                gray = clahe(&gray, self.config.clahe_tiles.max(1), self.config.clahe_clip_limit);
            }

            if self.config.denoise == DenoiseMode::Light {
                gray = median_3x3(&gray);
            }

            let binarize = match self.config.adaptive_threshold {
                ThresholdMode::On => true,
                ThresholdMode::Off => false,
                ThresholdMode::Auto => should_binarize(&gray),
            };
            if binarize {
                gray = adaptive_threshold(&gray, THRESHOLD_BLOCK, THRESHOLD_C);
            }

            DynamicImage::ImageLuma8(gray)
        } else {
            image.clone()
        };

        if self.config.upscale > 1.0 {
            let new_width = (width as f32 * self.config.upscale).round() as u32;
            let new_height = (height as f32 * self.config.upscale).round() as u32;
            debug!("Upscaling {}x{} -> {}x{}", width, height, new_width, new_height);
            processed = processed.resize_exact(new_width, new_height, FilterType::Lanczos3);
        }

        Ok(DynamicImage::ImageRgb8(processed.to_rgb8()))
    }
}

/// Mean and standard deviation of pixel brightness.
pub fn image_stats(gray: &GrayImage) -> (f32, f32) {
    let count = (gray.width() as f64) * (gray.height() as f64);
    if count == 0.0 {
        return (0.0, 0.0);
    }

    let (sum, sum_sq) = gray.pixels().fold((0.0f64, 0.0f64), |(s, sq), p| {
        let v = p[0] as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / count;
    let variance = (sum_sq / count - mean * mean).max(0.0);

    (mean as f32, variance.sqrt() as f32)
}

/// Whether a dark, high-contrast page benefits from binarization.
pub fn should_binarize(gray: &GrayImage) -> bool {
    let (mean, std) = image_stats(gray);
    debug!("Image stats: mean {:.1}, std {:.1}", mean, std);
    mean < AUTO_MAX_MEAN && std > AUTO_MIN_STD
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into `tiles x tiles` regions, each with a clipped
/// histogram-equalization lookup table; pixels are bilinearly interpolated
/// between the four nearest tile centres.
pub fn clahe(gray: &GrayImage, tiles: u32, clip_limit: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let tiles_x = tiles.min(width).max(1);
    let tiles_y = tiles.min(height).max(1);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }

            let pixels = (x1.saturating_sub(x0)) * (y1.saturating_sub(y0));
            luts[(ty * tiles_x + tx) as usize] = clipped_lut(&mut hist, pixels, clip_limit);
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        // Tile-centre coordinates of this pixel.
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let ty0 = fy.floor().clamp(0.0, (tiles_y - 1) as f32) as u32;
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let wy = (fy - ty0 as f32).clamp(0.0, 1.0);

        for x in 0..width {
            let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
            let tx0 = fx.floor().clamp(0.0, (tiles_x - 1) as f32) as u32;
            let tx1 = (tx0 + 1).min(tiles_x - 1);
            let wx = (fx - tx0 as f32).clamp(0.0, 1.0);

            let v = gray.get_pixel(x, y)[0] as usize;
            let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;

            let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
            let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;
            let value = top * (1.0 - wy) + bottom * wy;

            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }

    out
}

fn clipped_lut(hist: &mut [u32; 256], pixels: u32, clip_limit: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    if pixels == 0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let limit = ((clip_limit * pixels as f32 / 256.0).max(1.0)) as u32;
    let mut excess = 0u32;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let bonus = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, count) in hist.iter_mut().enumerate() {
        *count += bonus + u32::from(i < remainder);
    }

    let mut cumulative = 0u32;
    for (i, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = ((cumulative as f32 * 255.0) / pixels as f32).round().min(255.0) as u8;
    }
    lut
}

/// 3x3 median filter with clamped edges.
pub fn median_3x3(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut window = [0u8; 9];
            let mut i = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let sx = (x as i64 + dx).clamp(0, width as i64 - 1) as u32;
                    let sy = (y as i64 + dy).clamp(0, height as i64 - 1) as u32;
                    window[i] = gray.get_pixel(sx, sy)[0];
                    i += 1;
                }
            }
            window.sort_unstable();
            out.put_pixel(x, y, Luma([window[4]]));
        }
    }

    out
}

/// Mean adaptive threshold: a pixel is white when brighter than its
/// `block_size` neighbourhood mean minus `c`.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let half = block_size / 2;

    // Summed-area table with a zero row/column border.
    let stride = width as usize + 1;
    let mut integral = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height as usize {
        let mut row = 0u64;
        for x in 0..width as usize {
            row += gray.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let y0 = y.saturating_sub(half) as usize;
        let y1 = (y + half + 1).min(height) as usize;
        for x in 0..width {
            let x0 = x.saturating_sub(half) as usize;
            let x1 = (x + half + 1).min(width) as usize;

            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let count = ((x1 - x0) * (y1 - y0)) as u64;
            let mean = (sum / count) as i32;

            let value = if gray.get_pixel(x, y)[0] as i32 > mean - c { 255 } else { 0 };
            out.put_pixel(x, y, Luma([value]));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([(x * 255 / width.max(1)) as u8]))
    }

    #[test]
    fn test_output_is_rgb() {
        let image = DynamicImage::ImageLuma8(gradient(40, 20));
        let processed = Preprocessor::default().preprocess(&image);
        assert!(matches!(processed, DynamicImage::ImageRgb8(_)));
        assert_eq!(processed.dimensions(), (40, 20));
    }

    #[test]
    fn test_upscale() {
        let config = PreprocessConfig {
            upscale: 2.0,
            ..Default::default()
        };
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 8, Rgb([200, 200, 200])));
        let processed = Preprocessor::new(config).preprocess(&image);
        assert_eq!(processed.dimensions(), (20, 16));
    }

    #[test]
    fn test_empty_image_falls_back() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let processor = Preprocessor::default();
        assert!(processor.try_preprocess(&image).is_err());
        assert_eq!(processor.preprocess(&image).dimensions(), (0, 0));
    }

    #[test]
    fn test_binarize_decision() {
        let bright = GrayImage::from_pixel(20, 20, Luma([240]));
        assert!(!should_binarize(&bright));

        let checker = GrayImage::from_fn(20, 20, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 200 }]));
        let (mean, std) = image_stats(&checker);
        assert_eq!(mean, 100.0);
        assert_eq!(std, 100.0);
        assert!(should_binarize(&checker));
    }

    #[test]
    fn test_median_removes_speckle() {
        let mut image = GrayImage::from_pixel(5, 5, Luma([255]));
        image.put_pixel(2, 2, Luma([0]));
        assert_eq!(median_3x3(&image).get_pixel(2, 2)[0], 255);
    }

    #[test]
    fn test_threshold_is_binary() {
        let out = adaptive_threshold(&gradient(30, 30), 15, 5);
        assert!(out.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_clahe_keeps_size() {
        let out = clahe(&gradient(64, 48), 8, 2.0);
        assert_eq!(out.dimensions(), (64, 48));
    }
}
