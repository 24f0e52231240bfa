//! Stage tokens for the model lifecycle.
//!
//! Each token is only obtainable from the previous stage's transition, so
//! `train` without `compile` (or `predict` without `train`) does not type-check.

use std::sync::Arc;

use crate::data::{Batch, ImageTensor, NUM_CLASSES};
use crate::error::{Error, Result};
use crate::math::argmax;
use crate::model::ModelDefinition;
use crate::train::{TrainConfig, Trainer};

/// A model definition accepted for compilation.
#[derive(Debug, Clone)]
pub struct Prepared {
    definition: ModelDefinition,
}

impl Prepared {
    pub fn new(definition: ModelDefinition) -> Self {
        Prepared { definition }
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    pub fn compile<T: Trainer>(&self, trainer: &T) -> Result<Compiled<T>> {
        let artifact = trainer.compile(&self.definition)?;
        Ok(Compiled { definition: self.definition.clone(), artifact: Arc::new(artifact) })
    }
}

/// Executable structure without learned weights.
pub struct Compiled<T: Trainer> {
    definition: ModelDefinition,
    artifact: Arc<T::Compiled>,
}

impl<T: Trainer> Clone for Compiled<T> {
    fn clone(&self) -> Self {
        Compiled { definition: self.definition.clone(), artifact: self.artifact.clone() }
    }
}

impl<T: Trainer> Compiled<T> {
    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    pub fn artifact(&self) -> &T::Compiled {
        &self.artifact
    }

    /// Blocking training run. Rejects batches whose target convention differs
    /// from the trainer binding before any work starts.
    pub fn train(&self, trainer: &T, batch: &Batch, config: &TrainConfig) -> Result<Trained<T>> {
        if batch.target_mode() != trainer.target_mode() {
            return Err(Error::TargetMode { expected: trainer.target_mode(), found: batch.target_mode() });
        }
        let model = trainer.train(&self.artifact, batch, config)?;
        Ok(Trained { definition: self.definition.clone(), model: Arc::new(model) })
    }
}

/// Structure plus learned weights; the only stage that can run inference.
pub struct Trained<T: Trainer> {
    definition: ModelDefinition,
    model: Arc<T::Trained>,
}

impl<T: Trainer> Clone for Trained<T> {
    fn clone(&self) -> Self {
        Trained { definition: self.definition.clone(), model: self.model.clone() }
    }
}

impl<T: Trainer> Trained<T> {
    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    pub fn model(&self) -> &T::Trained {
        &self.model
    }

    /// Fraction of `batch` whose arg-max output equals the paired label.
    /// Runs over the whole batch before reporting.
    pub fn evaluate(&self, trainer: &T, batch: &Batch) -> Result<f32> {
        if batch.is_empty() {
            return Err(Error::Usage("cannot evaluate on an empty batch".into()));
        }
        let outputs = trainer.infer_batch(&self.model, batch)?;
        let matches = outputs.iter().zip(batch.iter())
            .filter(|(output, sample)| argmax(output) == Some(sample.target.label() as usize))
            .count();
        Ok(matches as f32 / batch.count() as f32)
    }

    /// Single-image prediction; ties go to the lowest digit.
    pub fn predict(&self, trainer: &T, image: &ImageTensor) -> Result<u8> {
        let output = trainer.infer(&self.model, image)?;
        if output.len() != NUM_CLASSES {
            return Err(Error::Usage(format!(
                "trainer returned {} scores instead of {}",
                output.len(),
                NUM_CLASSES
            )));
        }
        argmax(&output)
            .map(|digit| digit as u8)
            .ok_or_else(|| Error::Usage("model output contains no finite score".into()))
    }
}
