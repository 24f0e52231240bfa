use serde::{Deserialize, Serialize};

/// Learning rate as a function of the (1-based) epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningRateSchedule {
    Constant(f32),
    /// `initial * factor^((epoch - 1) / every)`.
    StepDecay { initial: f32, factor: f32, every: usize },
}

impl LearningRateSchedule {
    pub fn rate(&self, epoch: usize) -> f32 {
        match *self {
            LearningRateSchedule::Constant(lr) => lr,
            LearningRateSchedule::StepDecay { initial, factor, every } => {
                let steps = epoch.saturating_sub(1) / every.max(1);
                initial * factor.powi(steps as i32)
            }
        }
    }
}

impl Default for LearningRateSchedule {
    fn default() -> Self {
        LearningRateSchedule::Constant(0.01)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_decay_halves_every_two_epochs() {
        let s = LearningRateSchedule::StepDecay { initial: 0.1, factor: 0.5, every: 2 };
        assert_eq!(s.rate(1), 0.1);
        assert_eq!(s.rate(2), 0.1);
        assert!((s.rate(3) - 0.05).abs() < 1e-7);
        assert!((s.rate(5) - 0.025).abs() < 1e-7);
    }
}
