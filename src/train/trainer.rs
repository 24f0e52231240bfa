use std::path::Path;

use crate::data::{Batch, ImageTensor, TargetMode};
use crate::error::Result;
use crate::model::ModelDefinition;
use crate::train::train_config::TrainConfig;

/// The gradient-descent capability the orchestrator delegates to.
///
/// `compile` turns a definition into an executable structure, `train` fits
/// weights (blocking; the orchestrator runs it on a worker thread and reads
/// per-epoch progress from `config.progress_tx`), and `infer` evaluates a
/// trained model.
///
/// Implementations must keep `infer` reentrant: it takes `&self` and a shared
/// model, and may be called from several threads at once.
pub trait Trainer: Send + Sync + 'static {
    /// Structure only, no learned weights.
    type Compiled: Send + Sync + 'static;
    /// Structure plus learned weights.
    type Trained: Send + Sync + 'static;

    /// The target encoding this binding trains against.
    fn target_mode(&self) -> TargetMode;

    /// Directory where `compile` should leave its artifact. The orchestrator
    /// calls this once with `Config::model_dir`; bindings that keep nothing on
    /// disk can ignore it.
    fn set_model_dir(&mut self, _dir: &Path) {}

    /// Fails with `Error::Compilation` if the definition is inconsistent.
    fn compile(&self, definition: &ModelDefinition) -> Result<Self::Compiled>;

    /// Fails with `Error::TrainingFailure` if the run does not complete.
    fn train(&self, compiled: &Self::Compiled, batch: &Batch, config: &TrainConfig) -> Result<Self::Trained>;

    /// Output distribution (10 class scores) for one image.
    fn infer(&self, model: &Self::Trained, image: &ImageTensor) -> Result<Vec<f32>>;

    /// Output distributions for every sample of `batch`, in batch order.
    fn infer_batch(&self, model: &Self::Trained, batch: &Batch) -> Result<Vec<Vec<f32>>> {
        batch.iter().map(|s| self.infer(model, &s.image)).collect()
    }
}
