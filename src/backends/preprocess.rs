//! Turns an uploaded photo into the square, normalised RGB input a local
//! vision model expects.

use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::error::BackendError;

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;

/// Photos taller than this many widths lose a band at top and bottom first.
const TALL_RATIO: u32 = 2;
const TALL_KEEP: f32 = 0.8;

/// Decodes `data` and returns `size * size * 3` floats in `0.0..=1.0`,
/// row-major, channels last.
pub fn image_to_input(data: &[u8], size: u32) -> Result<Vec<f32>, BackendError> {
    let decoded =
        image::load_from_memory(data).map_err(|e| BackendError::InvalidImage(e.to_string()))?;
    Ok(normalise(&fit_square(trim_tall(decoded), size)))
}

/// Keeps the middle 80% of very tall shots, where the leaf usually is.
pub fn trim_tall(image: DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    if height <= TALL_RATIO * width {
        return image;
    }
    let kept = (height as f32 * TALL_KEEP).round() as u32;
    image.crop_imm(0, (height - kept) / 2, width, kept)
}

/// Scales the shorter side to `size` and center-crops the longer one.
pub fn fit_square(image: DynamicImage, size: u32) -> DynamicImage {
    image.resize_to_fill(size, size, FilterType::CatmullRom)
}

fn normalise(image: &DynamicImage) -> Vec<f32> {
    image
        .to_rgb8()
        .into_raw()
        .into_iter()
        .map(|channel| f32::from(channel) / 255.0)
        .collect()
}
