use rand::Rng;
use serde::{Serialize, Deserialize};
use std::f32::consts::PI;

/// Row-major dense matrix; dense-layer weights are stored `input × units`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<Vec<f32>>
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix{
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows]
        }
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f32 {
        // Draw two independent uniform samples in (0, 1] to avoid log(0).
        let u1: f32 = 1.0 - rng.gen::<f32>();
        let u2: f32 = 1.0 - rng.gen::<f32>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// Fills a (rows, cols) matrix with N(0, std_dev) samples.
    pub fn normal<R: Rng + ?Sized>(rows: usize, cols: usize, std_dev: f32, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                res.data[i][j] = Matrix::sample_standard_normal(rng) * std_dev;
            }
        }
        res
    }

    /// He initialization: N(0, sqrt(2 / fan_in)). Use before ReLU layers.
    pub fn he<R: Rng + ?Sized>(rows: usize, cols: usize, fan_in: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (2.0 / fan_in.max(1) as f32).sqrt(), rng)
    }

    /// Xavier (Glorot) initialization: N(0, sqrt(1 / fan_in)).
    pub fn xavier<R: Rng + ?Sized>(rows: usize, cols: usize, fan_in: usize, rng: &mut R) -> Matrix {
        Matrix::normal(rows, cols, (1.0 / fan_in.max(1) as f32).sqrt(), rng)
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f32) -> f32,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect(),
        }
    }

    /// `row * self` for a single row vector, without building a 1×n matrix.
    pub fn left_mul(&self, row: &[f32]) -> Vec<f32> {
        assert_eq!(row.len(), self.rows, "Matrices are of incorrect sizes");
        let mut out = vec![0.0; self.cols];
        for (x, weights) in row.iter().zip(&self.data) {
            if *x == 0.0 {
                continue;
            }
            for (o, w) in out.iter_mut().zip(weights) {
                *o += x * w;
            }
        }
        out
    }

    pub fn from_data(data: Vec<Vec<f32>>) -> Matrix {
        Matrix {
            rows: data.len(),
            cols: data.first().map(|r| r.len()).unwrap_or(0),
            data
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn left_mul_matches_matrix_product() {
        let m = Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
        assert_eq!(m.left_mul(&[1.0, 0.0, 2.0]), vec![11.0, 14.0]);
        assert_eq!(m.left_mul(&[0.0, 1.0, 0.0]), vec![3.0, 4.0]);
    }

    #[test]
    fn seeded_init_is_reproducible() {
        let a = Matrix::he(4, 3, 4, &mut StdRng::seed_from_u64(9));
        let b = Matrix::he(4, 3, 4, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }
}
