use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::math::matrix::Matrix;
use crate::optim::Sgd;

/// Fully-connected layer: `output = input · W + b`.
///
/// `weights` is `input_size × units`, so a row vector multiplies from the left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    pub weights: Matrix,
    pub biases: Vec<f32>,
}

/// Accumulated gradients for one [`Dense`] layer.
#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub weights: Matrix,
    pub biases: Vec<f32>,
}

impl Dense {
    /// He-initialized when `rectified` (followed by ReLU), Xavier otherwise.
    /// Biases start at zero.
    pub fn new<R: Rng + ?Sized>(input_size: usize, units: usize, rectified: bool, rng: &mut R) -> Dense {
        let weights = if rectified {
            Matrix::he(input_size, units, input_size, rng)
        } else {
            Matrix::xavier(input_size, units, input_size, rng)
        };
        Dense { weights, biases: vec![0.0; units] }
    }

    pub fn input_size(&self) -> usize {
        self.weights.rows
    }

    pub fn units(&self) -> usize {
        self.weights.cols
    }

    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut z = self.weights.left_mul(input);
        for (o, b) in z.iter_mut().zip(&self.biases) {
            *o += b;
        }
        z
    }

    pub fn zero_grads(&self) -> DenseGrads {
        DenseGrads {
            weights: Matrix::zeros(self.weights.rows, self.weights.cols),
            biases: vec![0.0; self.biases.len()],
        }
    }

    /// Accumulates gradients for one sample and returns ∂L/∂input.
    ///
    /// `delta` is ∂L/∂output for this layer; `input` is what `forward` saw.
    pub fn compute_gradients(&self, delta: &[f32], input: &[f32], grads: &mut DenseGrads) -> Vec<f32> {
        // ∂L/∂W = inputᵀ · δ  (outer product for a single sample)
        for (x, w_row) in input.iter().zip(grads.weights.data.iter_mut()) {
            if *x == 0.0 {
                continue;
            }
            for (g, d) in w_row.iter_mut().zip(delta) {
                *g += x * d;
            }
        }
        for (g, d) in grads.biases.iter_mut().zip(delta) {
            *g += d;
        }
        // ∂L/∂input = δ · Wᵀ
        self.weights.data.iter()
            .map(|w_row| w_row.iter().zip(delta).map(|(w, d)| w * d).sum())
            .collect()
    }

    /// Applies `scale`-averaged gradients through the optimizer.
    pub fn apply_gradients(&mut self, grads: &DenseGrads, scale: f32, optimizer: &Sgd) {
        let w = grads.weights.map(|g| g * scale);
        optimizer.step_matrix(&mut self.weights, &w);
        let b: Vec<f32> = grads.biases.iter().map(|g| g * scale).collect();
        optimizer.step(&mut self.biases, &b);
    }
}
