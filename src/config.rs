use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::TargetMode;
use crate::error::{Error, Result};
use crate::optim::LearningRateSchedule;

pub const MIN_EPOCHS: usize = 1;
pub const MAX_EPOCHS: usize = 30;
pub const MIN_HIDDEN_UNITS: usize = 50;
pub const MAX_HIDDEN_UNITS: usize = 750;
pub const HIDDEN_UNITS_STEP: usize = 25;

/// Runtime configuration for the data pipeline and the model orchestrator.
///
/// Every field has a default, so a JSON file only needs the keys it wants to
/// override. `model_dir` is where compiled model artifacts are written; it
/// defaults to the OS temp directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub train_csv: PathBuf,
    pub test_csv: PathBuf,
    pub model_dir: PathBuf,
    pub epochs: usize,
    pub hidden_units: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Optional step decay applied on top of `learning_rate`.
    pub lr_decay: Option<StepDecay>,
    /// Publish preparation progress every N rows (the final count is always published).
    pub progress_interval: usize,
    /// Fixes weight initialisation and shuffling when set.
    pub seed: Option<u64>,
    pub target_mode: TargetMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepDecay {
    pub factor: f32,
    pub every: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            train_csv: PathBuf::from("data/mnist_train.csv"),
            test_csv: PathBuf::from("data/mnist_test.csv"),
            model_dir: std::env::temp_dir(),
            epochs: 10,
            hidden_units: 100,
            batch_size: 32,
            learning_rate: 0.01,
            lr_decay: None,
            progress_interval: 100,
            seed: None,
            target_mode: TargetMode::OneHot,
        }
    }
}

impl Config {
    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_EPOCHS..=MAX_EPOCHS).contains(&self.epochs) {
            return Err(Error::Config(format!(
                "epochs must be in {}..={}, got {}",
                MIN_EPOCHS, MAX_EPOCHS, self.epochs
            )));
        }
        if !(MIN_HIDDEN_UNITS..=MAX_HIDDEN_UNITS).contains(&self.hidden_units)
            || self.hidden_units % HIDDEN_UNITS_STEP != 0
        {
            return Err(Error::Config(format!(
                "hidden_units must be a multiple of {} in {}..={}, got {}",
                HIDDEN_UNITS_STEP, MIN_HIDDEN_UNITS, MAX_HIDDEN_UNITS, self.hidden_units
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if let Some(decay) = self.lr_decay {
            if decay.every == 0 || !(decay.factor > 0.0 && decay.factor <= 1.0) {
                return Err(Error::Config(
                    "lr_decay needs every >= 1 and factor in (0, 1]".into(),
                ));
            }
        }
        if self.progress_interval == 0 {
            return Err(Error::Config("progress_interval must be at least 1".into()));
        }
        Ok(())
    }

    /// The learning-rate schedule implied by `learning_rate` and `lr_decay`.
    pub fn schedule(&self) -> LearningRateSchedule {
        match self.lr_decay {
            None => LearningRateSchedule::Constant(self.learning_rate),
            Some(decay) => LearningRateSchedule::StepDecay {
                initial: self.learning_rate,
                factor: decay.factor,
                every: decay.every,
            },
        }
    }

    /// Serializes the config to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Loads and validates a config from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = Config::default();
        config.epochs = 31;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.hidden_units = 60;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.lr_decay = Some(StepDecay { factor: 1.5, every: 2 });
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{ "epochs": 3, "seed": 7 }"#).unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.hidden_units, 100);
        assert_eq!(config.target_mode, TargetMode::OneHot);
    }

    #[test]
    fn schedule_follows_decay_setting() {
        let mut config = Config::default();
        assert_eq!(config.schedule(), LearningRateSchedule::Constant(0.01));
        config.lr_decay = Some(StepDecay { factor: 0.5, every: 2 });
        assert_eq!(
            config.schedule(),
            LearningRateSchedule::StepDecay { initial: 0.01, factor: 0.5, every: 2 }
        );
    }
}
