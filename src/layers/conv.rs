use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::{Matrix, Shape};
use crate::optim::Sgd;

/// 2-D convolution with square kernels, uniform stride and zero padding.
///
/// `weights` is laid out `[filter][in_channel][ky][kx]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    pub in_channels: usize,
    pub filters: usize,
    pub kernel: usize,
    pub stride: usize,
    pub padding: usize,
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct ConvGrads {
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

/// Output side length, or `None` when the padded input is smaller than the kernel.
pub fn conv_output_len(input: usize, kernel: usize, stride: usize, padding: usize) -> Option<usize> {
    let padded = input + 2 * padding;
    if kernel == 0 || stride == 0 || padded < kernel {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}

impl Conv2d {
    pub fn new<R: Rng + ?Sized>(
        in_channels: usize,
        filters: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        rectified: bool,
        rng: &mut R,
    ) -> Conv2d {
        let fan_in = in_channels * kernel * kernel;
        let init = if rectified {
            Matrix::he(filters, fan_in, fan_in, rng)
        } else {
            Matrix::xavier(filters, fan_in, fan_in, rng)
        };
        Conv2d {
            in_channels,
            filters,
            kernel,
            stride,
            padding,
            weights: init.data.into_iter().flatten().collect(),
            biases: vec![0.0; filters],
        }
    }

    pub fn output_shape(&self, input: Shape) -> Option<Shape> {
        Some(Shape::new(
            self.filters,
            conv_output_len(input.height, self.kernel, self.stride, self.padding)?,
            conv_output_len(input.width, self.kernel, self.stride, self.padding)?,
        ))
    }

    #[inline]
    fn weight_index(&self, f: usize, c: usize, ky: usize, kx: usize) -> usize {
        ((f * self.in_channels + c) * self.kernel + ky) * self.kernel + kx
    }

    /// Input coordinate under kernel tap `k` for output position `o`, if inside the image.
    #[inline]
    fn source(&self, o: usize, k: usize, limit: usize) -> Option<usize> {
        let pos = (o * self.stride + k) as isize - self.padding as isize;
        if pos < 0 || pos as usize >= limit {
            None
        } else {
            Some(pos as usize)
        }
    }

    pub fn forward(&self, input: &[f32], in_shape: Shape, out_shape: Shape) -> Vec<f32> {
        let mut out = vec![0.0; out_shape.len()];
        for f in 0..self.filters {
            for oy in 0..out_shape.height {
                for ox in 0..out_shape.width {
                    let mut sum = self.biases[f];
                    for c in 0..self.in_channels {
                        for ky in 0..self.kernel {
                            let Some(iy) = self.source(oy, ky, in_shape.height) else { continue };
                            for kx in 0..self.kernel {
                                let Some(ix) = self.source(ox, kx, in_shape.width) else { continue };
                                sum += self.weights[self.weight_index(f, c, ky, kx)]
                                    * input[in_shape.index(c, iy, ix)];
                            }
                        }
                    }
                    out[out_shape.index(f, oy, ox)] = sum;
                }
            }
        }
        out
    }

    pub fn zero_grads(&self) -> ConvGrads {
        ConvGrads {
            weights: vec![0.0; self.weights.len()],
            biases: vec![0.0; self.biases.len()],
        }
    }

    /// Accumulates gradients for one sample and returns ∂L/∂input.
    pub fn compute_gradients(
        &self,
        delta: &[f32],
        input: &[f32],
        in_shape: Shape,
        out_shape: Shape,
        grads: &mut ConvGrads,
    ) -> Vec<f32> {
        let mut d_input = vec![0.0; in_shape.len()];
        for f in 0..self.filters {
            for oy in 0..out_shape.height {
                for ox in 0..out_shape.width {
                    let d = delta[out_shape.index(f, oy, ox)];
                    if d == 0.0 {
                        continue;
                    }
                    grads.biases[f] += d;
                    for c in 0..self.in_channels {
                        for ky in 0..self.kernel {
                            let Some(iy) = self.source(oy, ky, in_shape.height) else { continue };
                            for kx in 0..self.kernel {
                                let Some(ix) = self.source(ox, kx, in_shape.width) else { continue };
                                let wi = self.weight_index(f, c, ky, kx);
                                let ii = in_shape.index(c, iy, ix);
                                grads.weights[wi] += d * input[ii];
                                d_input[ii] += d * self.weights[wi];
                            }
                        }
                    }
                }
            }
        }
        d_input
    }

    pub fn apply_gradients(&mut self, grads: &ConvGrads, scale: f32, optimizer: &Sgd) {
        let w: Vec<f32> = grads.weights.iter().map(|g| g * scale).collect();
        let b: Vec<f32> = grads.biases.iter().map(|g| g * scale).collect();
        optimizer.step(&mut self.weights, &w);
        optimizer.step(&mut self.biases, &b);
    }
}
