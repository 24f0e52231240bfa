use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const IMAGE_SIDE: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const NUM_CLASSES: usize = 10;

/// One decoded CSV row: a label and 784 raw intensities in row-major order.
///
/// The label is kept as read; range checking happens in the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub label: i64,
    pub pixels: Vec<u8>,
}

/// A 28×28 grid of normalized intensities in [0, 1], row-major.
///
/// This is the common currency between the CSV pipeline, the canvas adapter
/// and the trainer's `infer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageTensor {
    pixels: Vec<f32>,
}

impl ImageTensor {
    /// Wraps a flat row-major buffer; it must hold exactly 784 values.
    pub fn new(pixels: Vec<f32>) -> Result<Self> {
        if pixels.len() != IMAGE_PIXELS {
            return Err(Error::Usage(format!(
                "an image tensor needs {} values, got {}",
                IMAGE_PIXELS,
                pixels.len()
            )));
        }
        Ok(ImageTensor { pixels })
    }

    pub fn zeros() -> Self {
        ImageTensor { pixels: vec![0.0; IMAGE_PIXELS] }
    }

    pub fn from_grid(grid: &[[f32; IMAGE_SIDE]; IMAGE_SIDE]) -> Self {
        ImageTensor { pixels: grid.iter().flatten().copied().collect() }
    }

    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.pixels[row * IMAGE_SIDE + col]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_and_flat_views_agree() {
        let mut grid = [[0.0; IMAGE_SIDE]; IMAGE_SIDE];
        grid[3][5] = 0.75;
        let tensor = ImageTensor::from_grid(&grid);
        assert_eq!(tensor.at(3, 5), 0.75);
        assert_eq!(tensor.as_slice()[3 * IMAGE_SIDE + 5], 0.75);
        assert_eq!(tensor.at(0, 0), 0.0);
    }

    #[test]
    fn wrong_length_is_a_usage_error() {
        assert!(matches!(ImageTensor::new(vec![0.0; 10]), Err(Error::Usage(_))));
    }
}
