use crate::math::matrix::Matrix;

pub struct Sgd {
    pub learning_rate: f32,
}

impl Sgd {
    pub fn new(learning_rate: f32) -> Sgd {
        Sgd { learning_rate }
    }

    /// `params -= lr * grads`, element-wise.
    pub fn step(&self, params: &mut [f32], grads: &[f32]) {
        for (p, g) in params.iter_mut().zip(grads) {
            *p -= self.learning_rate * g;
        }
    }

    pub fn step_matrix(&self, params: &mut Matrix, grads: &Matrix) {
        for (row, grad_row) in params.data.iter_mut().zip(&grads.data) {
            self.step(row, grad_row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_moves_against_the_gradient() {
        let sgd = Sgd::new(0.5);
        let mut params = vec![1.0, -1.0];
        sgd.step(&mut params, &[2.0, -2.0]);
        assert_eq!(params, vec![0.0, 0.0]);
    }
}
