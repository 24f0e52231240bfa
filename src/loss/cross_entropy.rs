/// Categorical cross-entropy loss for use with a Softmax output layer.
pub struct CrossEntropyLoss;

/// Small epsilon added inside log() to prevent log(0) = -inf.
const EPS: f32 = 1e-7;

impl CrossEntropyLoss {
    /// Computes the scalar cross-entropy loss:
    ///   L = -sum(expected[i] * log(predicted[i] + eps))
    ///
    /// `predicted`: softmax probabilities, shape [n_classes]
    /// `expected` : one-hot target distribution, shape [n_classes]
    pub fn loss(predicted: &[f32], expected: &[f32]) -> f32 {
        predicted.iter().zip(expected.iter())
            .map(|(p, e)| -e * (p + EPS).ln())
            .sum()
    }

    /// Gradient of the combined Softmax + cross-entropy w.r.t. the pre-softmax
    /// logits:
    ///   ∂L/∂z_i = predicted[i] - expected[i]
    ///
    /// The Softmax layer passes this delta through unchanged in the backward
    /// pass, so the Jacobian is not applied twice.
    pub fn derivative(predicted: &[f32], expected: &[f32]) -> Vec<f32> {
        predicted.iter().zip(expected.iter())
            .map(|(p, e)| p - e)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confident_correct_prediction_has_low_loss() {
        let target = [0.0, 1.0, 0.0];
        let good = CrossEntropyLoss::loss(&[0.01, 0.98, 0.01], &target);
        let bad = CrossEntropyLoss::loss(&[0.98, 0.01, 0.01], &target);
        assert!(good < bad);
        assert!(good > 0.0);
    }

    #[test]
    fn derivative_is_prediction_minus_target() {
        let d = CrossEntropyLoss::derivative(&[0.2, 0.8], &[0.0, 1.0]);
        assert!((d[0] - 0.2).abs() < 1e-6);
        assert!((d[1] + 0.2).abs() < 1e-6);
    }
}
