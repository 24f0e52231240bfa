use serde::{Deserialize, Serialize};

use crate::math::Shape;

/// Max pooling over square windows, channel by channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaxPool2d {
    pub size: usize,
    pub stride: usize,
}

pub fn pool_output_len(input: usize, size: usize, stride: usize) -> Option<usize> {
    if size == 0 || stride == 0 || input < size {
        return None;
    }
    Some((input - size) / stride + 1)
}

impl MaxPool2d {
    pub fn output_shape(&self, input: Shape) -> Option<Shape> {
        Some(Shape::new(
            input.channels,
            pool_output_len(input.height, self.size, self.stride)?,
            pool_output_len(input.width, self.size, self.stride)?,
        ))
    }

    /// Flat input index of the window maximum; ties go to the first position.
    fn winner(&self, input: &[f32], in_shape: Shape, c: usize, oy: usize, ox: usize) -> usize {
        let mut best_idx = in_shape.index(c, oy * self.stride, ox * self.stride);
        let mut best = input[best_idx];
        for dy in 0..self.size {
            for dx in 0..self.size {
                let idx = in_shape.index(c, oy * self.stride + dy, ox * self.stride + dx);
                if input[idx] > best {
                    best = input[idx];
                    best_idx = idx;
                }
            }
        }
        best_idx
    }

    pub fn forward(&self, input: &[f32], in_shape: Shape, out_shape: Shape) -> Vec<f32> {
        let mut out = vec![0.0; out_shape.len()];
        for c in 0..out_shape.channels {
            for oy in 0..out_shape.height {
                for ox in 0..out_shape.width {
                    out[out_shape.index(c, oy, ox)] = input[self.winner(input, in_shape, c, oy, ox)];
                }
            }
        }
        out
    }

    /// Routes each output gradient back to the input position that won the window.
    pub fn backward(&self, delta: &[f32], input: &[f32], in_shape: Shape, out_shape: Shape) -> Vec<f32> {
        let mut d_input = vec![0.0; in_shape.len()];
        for c in 0..out_shape.channels {
            for oy in 0..out_shape.height {
                for ox in 0..out_shape.width {
                    let winner = self.winner(input, in_shape, c, oy, ox);
                    d_input[winner] += delta[out_shape.index(c, oy, ox)];
                }
            }
        }
        d_input
    }
}
