//! Decoding image files (PNG/JPEG/BMP/GIF) into model inputs.

use image::imageops::FilterType;

use crate::data::{ImageTensor, IMAGE_SIDE};
use crate::error::Result;

/// Decodes `bytes`, resizes to 28×28 grayscale and scales to [0, 1].
///
/// Set `invert` for dark-on-light images (e.g. a scanned digit on paper);
/// the model expects light strokes on a dark background.
pub fn image_bytes_to_tensor(bytes: &[u8], invert: bool) -> Result<ImageTensor> {
    let img = image::load_from_memory(bytes)?;
    let side = IMAGE_SIDE as u32;
    let gray = img.resize_exact(side, side, FilterType::Triangle).to_luma8();
    let pixels = gray.pixels().map(|p| {
        let v = p.0[0] as f32 / 255.0;
        if invert { 1.0 - v } else { v }
    });
    ImageTensor::new(pixels.collect())
}
