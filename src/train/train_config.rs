use std::sync::mpsc;
use std::sync::{Arc, atomic::AtomicBool};

use crate::model::ModelDefinition;
use crate::optim::LearningRateSchedule;
use crate::train::epoch_stats::EpochStats;

/// Configuration for a `train_loop` run.
///
/// # Fields
/// - `epochs`     : total number of full passes over the training data
/// - `batch_size` : samples per mini-batch; use `1` for online SGD
/// - `schedule`   : learning rate per epoch
/// - `seed`       : fixes weight initialisation and shuffling when set
/// - `progress_tx`: optional channel sender; one `EpochStats` is sent per
///                   completed epoch. If the receiver is dropped the run is
///                   abandoned.
/// - `stop_flag`  : optional atomic flag; when set to `true` from another
///                   thread the run stops at the next epoch boundary.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub schedule: LearningRateSchedule,
    pub seed: Option<u64>,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainConfig {
    /// Creates a minimal `TrainConfig` with no progress channel and no stop flag.
    pub fn new(epochs: usize, batch_size: usize, schedule: LearningRateSchedule) -> Self {
        TrainConfig {
            epochs,
            batch_size,
            schedule,
            seed: None,
            progress_tx: None,
            stop_flag: None,
        }
    }

    /// Takes epochs and optimizer settings from a model definition.
    pub fn from_definition(definition: &ModelDefinition) -> Self {
        TrainConfig::new(
            definition.epochs,
            definition.optimizer.batch_size,
            definition.optimizer.schedule,
        )
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}
