use std::path::{Path, PathBuf};

use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::data::{Batch, ImageTensor, TargetMode};
use crate::error::{Error, Result};
use crate::math::Shape;
use crate::model::{ModelDefinition, Network};
use crate::train::loop_fn::train_loop;
use crate::train::train_config::TrainConfig;
use crate::train::trainer::Trainer;

/// From-scratch CPU trainer: mini-batch SGD with softmax cross-entropy,
/// trained against one-hot targets.
#[derive(Debug, Clone, Default)]
pub struct CpuTrainer {
    /// Where compiled definitions are written; `None` keeps compilation in memory.
    model_dir: Option<PathBuf>,
}

/// A validated definition with its per-layer shapes.
#[derive(Debug, Clone)]
pub struct CpuCompiled {
    pub definition: ModelDefinition,
    pub shapes: Vec<Shape>,
    /// On-disk copy of the definition, when the trainer has a model directory.
    pub artifact_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CpuTrained {
    pub network: Network,
    /// Mean loss of the last epoch.
    pub final_loss: f32,
}

impl CpuTrainer {
    pub fn new() -> Self {
        CpuTrainer { model_dir: None }
    }

    pub fn with_model_dir(model_dir: impl Into<PathBuf>) -> Self {
        CpuTrainer { model_dir: Some(model_dir.into()) }
    }

    pub fn model_dir(&self) -> Option<&Path> {
        self.model_dir.as_deref()
    }
}

impl Trainer for CpuTrainer {
    type Compiled = CpuCompiled;
    type Trained = CpuTrained;

    fn target_mode(&self) -> TargetMode {
        TargetMode::OneHot
    }

    fn set_model_dir(&mut self, dir: &Path) {
        self.model_dir = Some(dir.to_path_buf());
    }

    fn compile(&self, definition: &ModelDefinition) -> Result<CpuCompiled> {
        let shapes = definition.infer_shapes()?;

        let artifact_path = match &self.model_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
                let path = dir.join(format!("{}.json", definition.name));
                definition.save_json(&path)?;
                Some(path)
            }
            None => None,
        };

        let params: usize = shapes.windows(2).zip(&definition.layers)
            .map(|(pair, layer)| parameter_count(layer, pair[0], pair[1]))
            .sum();
        info!(
            "compiled '{}': {} layers, {} parameters, {} -> {}",
            definition.name,
            definition.layers.len(),
            params,
            shapes[0],
            shapes[shapes.len() - 1]
        );

        Ok(CpuCompiled { definition: definition.clone(), shapes, artifact_path })
    }

    fn train(&self, compiled: &CpuCompiled, batch: &Batch, config: &TrainConfig) -> Result<CpuTrained> {
        if batch.target_mode() != self.target_mode() {
            return Err(Error::TargetMode { expected: self.target_mode(), found: batch.target_mode() });
        }
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut network = Network::from_definition(&compiled.definition, compiled.shapes.clone(), &mut rng);
        let final_loss = train_loop(&mut network, batch, config, &mut rng)?;
        Ok(CpuTrained { network, final_loss })
    }

    fn infer(&self, model: &CpuTrained, image: &ImageTensor) -> Result<Vec<f32>> {
        let input = image.as_slice();
        if input.len() != model.network.input_len() {
            return Err(Error::Usage(format!(
                "model expects {} inputs, got {}",
                model.network.input_len(),
                input.len()
            )));
        }
        Ok(model.network.forward(input))
    }
}

fn parameter_count(layer: &crate::model::LayerSpec, input: Shape, output: Shape) -> usize {
    use crate::model::LayerSpec;
    match *layer {
        LayerSpec::Conv2d { in_channels, filters, kernel, .. } => filters * (in_channels * kernel * kernel + 1),
        LayerSpec::Dense { .. } => input.len() * output.len() + output.len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{encode, BatchBuilder, Sample, IMAGE_PIXELS};
    use crate::model::{define_model, LayerSpec};
    use crate::optim::LearningRateSchedule;
    use std::sync::mpsc;

    fn tiny_batch(mode: TargetMode) -> Batch {
        let mut builder = BatchBuilder::new(mode);
        for label in 0..4i64 {
            let pixels = (0..IMAGE_PIXELS).map(|i| ((i as i64 * (label + 1)) % 256) as u8).collect();
            builder.push(encode(&Sample { label, pixels }, mode).unwrap()).unwrap();
        }
        builder.freeze()
    }

    fn config(epochs: usize) -> TrainConfig {
        TrainConfig::new(epochs, 2, LearningRateSchedule::Constant(0.01)).with_seed(Some(11))
    }

    #[test]
    fn compile_rejects_inconsistent_definitions() {
        let mut def = define_model(50, 1);
        def.layers[7] = LayerSpec::Dense { input_size: 100, units: 50 };
        assert!(matches!(CpuTrainer::new().compile(&def), Err(Error::Compilation(_))));
    }

    #[test]
    fn compile_writes_the_artifact_into_the_model_dir() {
        let dir = std::env::temp_dir().join(format!("ferrite-digits-cpu-{}", std::process::id()));
        let trainer = CpuTrainer::with_model_dir(&dir);
        let compiled = trainer.compile(&define_model(50, 1).with_name("artifact_test")).unwrap();
        let path = compiled.artifact_path.unwrap();
        assert_eq!(path, dir.join("artifact_test.json"));
        assert_eq!(ModelDefinition::load_json(&path).unwrap(), compiled.definition);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn training_reports_every_epoch_in_order() {
        let trainer = CpuTrainer::new();
        let compiled = trainer.compile(&define_model(50, 2)).unwrap();
        let (tx, rx) = mpsc::channel();
        let mut cfg = config(2);
        cfg.progress_tx = Some(tx);

        let trained = trainer.train(&compiled, &tiny_batch(TargetMode::OneHot), &cfg).unwrap();
        drop(cfg);
        let epochs: Vec<usize> = rx.iter().map(|s| s.epoch).collect();
        assert_eq!(epochs, vec![1, 2]);
        assert!(trained.final_loss.is_finite());
    }

    #[test]
    fn same_seed_gives_same_model() {
        let trainer = CpuTrainer::new();
        let compiled = trainer.compile(&define_model(50, 1)).unwrap();
        let batch = tiny_batch(TargetMode::OneHot);
        let a = trainer.train(&compiled, &batch, &config(1)).unwrap();
        let b = trainer.train(&compiled, &batch, &config(1)).unwrap();
        let zeros = ImageTensor::zeros();
        assert_eq!(trainer.infer(&a, &zeros).unwrap(), trainer.infer(&b, &zeros).unwrap());
    }

    #[test]
    fn scalar_batches_are_rejected() {
        let trainer = CpuTrainer::new();
        let compiled = trainer.compile(&define_model(50, 1)).unwrap();
        let err = trainer.train(&compiled, &tiny_batch(TargetMode::Scalar), &config(1)).unwrap_err();
        assert!(matches!(err, Error::TargetMode { .. }));
    }

    #[test]
    fn stop_flag_turns_into_a_training_failure() {
        let trainer = CpuTrainer::new();
        let compiled = trainer.compile(&define_model(50, 3)).unwrap();
        let mut cfg = config(3);
        cfg.stop_flag = Some(std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true)));
        let err = trainer.train(&compiled, &tiny_batch(TargetMode::OneHot), &cfg).unwrap_err();
        assert!(matches!(err, Error::TrainingFailure(_)));
    }
}
