//! Challenge Image Preprocessing
//!
//! Pure transforms that turn a raw challenge screenshot into a clean
//! two-level bitmap for digit recognition. Source glyphs are tiny, so the
//! pipeline upscales first, then flattens to grayscale, stretches contrast,
//! binarizes at a fixed threshold and removes isolated noise pixels with a
//! 3x3 majority filter. Every step is deterministic for identical input
//! bytes and tuning.

use image::imageops::FilterType;
use image::GrayImage;

use crate::models::settings::RecognitionTuning;
use crate::utils::error::AppResult;

/// Run the full preprocessing pipeline on raw image bytes.
pub fn preprocess(bytes: &[u8], tuning: &RecognitionTuning) -> AppResult<GrayImage> {
    let source = image::load_from_memory(bytes)?;
    let factor = tuning.upscale_factor.max(1);
    let upscaled = source.resize_exact(
        source.width() * factor,
        source.height() * factor,
        FilterType::Lanczos3,
    );

    let mut gray = upscaled.to_luma8();
    stretch_contrast(&mut gray, tuning.contrast_gain);
    binarize(&mut gray, tuning.threshold);
    Ok(majority_filter(&gray))
}

/// Linear contrast stretch around mid-gray.
fn stretch_contrast(image: &mut GrayImage, gain: f32) {
    for pixel in image.pixels_mut() {
        let stretched = (f32::from(pixel.0[0]) - 128.0) * gain + 128.0;
        pixel.0[0] = stretched.clamp(0.0, 255.0) as u8;
    }
}

/// Binarize to exactly two levels: 0 and 255.
fn binarize(image: &mut GrayImage, threshold: u8) {
    for pixel in image.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
}

/// 3x3 majority filter over a binary image.
///
/// Equivalent to a median filter on two-level input; removes isolated
/// pixels without eroding digit strokes. Border windows are clamped to the
/// image bounds.
fn majority_filter(image: &GrayImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut filtered = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut white = 0u32;
            let mut total = 0u32;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    total += 1;
                    if image.get_pixel(nx as u32, ny as u32).0[0] == 255 {
                        white += 1;
                    }
                }
            }
            let value = if white * 2 > total { 255 } else { 0 };
            filtered.put_pixel(x, y, image::Luma([value]));
        }
    }

    filtered
}
