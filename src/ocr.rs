//! Text extraction from screen grabs.
//!
//! The raw frame goes through grayscale conversion, tile-based local
//! contrast enhancement, and a median denoise before Tesseract sees it.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use imageproc::filter::median_filter;
use rusty_tesseract::{Args, Image};
use tracing::{debug, warn};

use crate::config::OcrConfig;

const TILE_GRID: u32 = 8;
const CLIP_LIMIT: f32 = 2.0;

/// OCR over one captured frame. `Ok(None)` means no text on screen, an
/// expected outcome rather than a failure.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, img: &RgbaImage) -> Result<Option<String>>;
}

/// Tesseract-backed extractor. Defaults: single uniform block of text
/// (PSM 6) recognized with the LSTM engine (OEM 1).
pub struct TesseractExtractor {
    language: String,
    psm: i32,
    oem: i32,
    dpi: i32,
}

impl TesseractExtractor {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            language: config.language.clone(),
            psm: config.psm,
            oem: config.oem,
            dpi: config.dpi,
        }
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract(&self, img: &RgbaImage) -> Result<Option<String>> {
        let prepared = preprocess(img);
        let tess_img = Image::from_dynamic_image(&DynamicImage::ImageLuma8(prepared))
            .map_err(|e| anyhow!("failed to build tesseract input image: {e}"))?;

        let args = Args {
            lang: self.language.clone(),
            config_variables: HashMap::new(),
            dpi: Some(self.dpi),
            psm: Some(self.psm),
            oem: Some(self.oem),
        };

        let text = rusty_tesseract::image_to_string(&tess_img, &args)
            .map_err(|e| anyhow!("tesseract failed: {e}"))?;
        let text = text.trim();
        if text.is_empty() {
            warn!("no text detected on screen");
            return Ok(None);
        }
        debug!("extracted {} characters", text.len());
        Ok(Some(text.to_string()))
    }
}

/// Grayscale, local contrast enhancement, and denoising ahead of OCR.
pub fn preprocess(img: &RgbaImage) -> GrayImage {
    let gray = image::imageops::grayscale(img);
    let enhanced = equalize_adaptive(&gray, TILE_GRID, CLIP_LIMIT);
    median_filter(&enhanced, 1, 1)
}

/// Tile-based histogram equalization with a clip limit. Each tile gets its
/// own clipped CDF lookup table; per-pixel output bilinearly interpolates
/// between the four surrounding tile tables to avoid visible seams.
fn equalize_adaptive(gray: &GrayImage, grid: u32, clip_limit: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }
    let tiles_x = grid.min(width).max(1);
    let tiles_y = grid.min(height).max(1);
    let tile_w = width.div_ceil(tiles_x);
    let tile_h = height.div_ceil(tiles_y);

    let mut tables = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
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
            let count = (x1 - x0) * (y1 - y0);
            tables[(ty * tiles_x + tx) as usize] = clipped_cdf_table(&hist, count, clip_limit);
        }
    }

    let mut out = GrayImage::new(width, height);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let v = gray.get_pixel(x, y)[0] as usize;

        // Position in tile-center space, clamped at the borders
        let fx = ((x as f32 + 0.5) / tile_w as f32 - 0.5).clamp(0.0, (tiles_x - 1) as f32);
        let fy = ((y as f32 + 0.5) / tile_h as f32 - 0.5).clamp(0.0, (tiles_y - 1) as f32);
        let tx0 = fx.floor() as u32;
        let ty0 = fy.floor() as u32;
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let wx = fx - tx0 as f32;
        let wy = fy - ty0 as f32;

        let lookup = |tx: u32, ty: u32| tables[(ty * tiles_x + tx) as usize][v] as f32;
        let top = lookup(tx0, ty0) * (1.0 - wx) + lookup(tx1, ty0) * wx;
        let bottom = lookup(tx0, ty1) * (1.0 - wx) + lookup(tx1, ty1) * wx;
        *px = Luma([(top * (1.0 - wy) + bottom * wy).round() as u8]);
    }
    out
}

fn clipped_cdf_table(hist: &[u32; 256], count: u32, clip_limit: f32) -> [u8; 256] {
    if count == 0 {
        let mut identity = [0u8; 256];
        for (i, slot) in identity.iter_mut().enumerate() {
            *slot = i as u8;
        }
        return identity;
    }

    let limit = ((clip_limit * count as f32 / 256.0).ceil() as u32).max(1);
    let mut clipped = *hist;
    let mut excess = 0u32;
    for bin in clipped.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    // Redistribute the clipped mass evenly across all bins
    let bonus = excess / 256;
    for bin in clipped.iter_mut() {
        *bin += bonus;
    }

    let total: u64 = clipped.iter().map(|&b| b as u64).sum();
    let mut table = [0u8; 256];
    let mut cumulative = 0u64;
    for (i, &bin) in clipped.iter().enumerate() {
        cumulative += bin as u64;
        table[i] = ((cumulative * 255) / total.max(1)) as u8;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn preprocess_keeps_dimensions() {
        let img = RgbaImage::from_pixel(97, 53, Rgba([120, 80, 200, 255]));
        let out = preprocess(&img);
        assert_eq!(out.dimensions(), (97, 53));
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let gray = GrayImage::from_pixel(64, 64, Luma([100]));
        let out = equalize_adaptive(&gray, TILE_GRID, CLIP_LIMIT);
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn low_contrast_ramp_gets_stretched() {
        let mut gray = GrayImage::new(128, 32);
        for (x, _, px) in gray.enumerate_pixels_mut() {
            *px = Luma([(100 + x / 8) as u8]);
        }
        let out = equalize_adaptive(&gray, TILE_GRID, CLIP_LIMIT);

        let range = |img: &GrayImage| {
            let min = img.pixels().map(|p| p[0]).min().unwrap();
            let max = img.pixels().map(|p| p[0]).max().unwrap();
            max - min
        };
        assert!(range(&out) > range(&gray));
    }

    #[test]
    fn empty_histogram_maps_to_identity() {
        let table = clipped_cdf_table(&[0u32; 256], 0, CLIP_LIMIT);
        assert_eq!(table[0], 0);
        assert_eq!(table[128], 128);
        assert_eq!(table[255], 255);
    }
}
