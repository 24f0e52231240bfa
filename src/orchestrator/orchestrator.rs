use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;

use log::{info, warn};

use crate::config::Config;
use crate::data::{
    BatchPreparationStatus, BatchPreparer, DataFiles, ImageTensor, PreparationOptions,
};
use crate::error::{Error, Result};
use crate::model::{define_model, ModelDefinition};
use crate::orchestrator::stage::{Compiled, Prepared, Trained};
use crate::train::{EpochStats, TrainConfig, Trainer};

/// How far the model has progressed. Each variant keeps the tokens of the
/// stages before it, so falling back one stage never needs recomputation.
enum ModelStage<T: Trainer> {
    Created,
    Prepared(Prepared),
    Compiled(Prepared, Compiled<T>),
    Trained(Prepared, Compiled<T>, Trained<T>),
}

impl<T: Trainer> ModelStage<T> {
    fn prepared(&self) -> Option<&Prepared> {
        match self {
            ModelStage::Created => None,
            ModelStage::Prepared(p) | ModelStage::Compiled(p, _) | ModelStage::Trained(p, _, _) => Some(p),
        }
    }

    fn compiled(&self) -> Option<&Compiled<T>> {
        match self {
            ModelStage::Compiled(_, c) | ModelStage::Trained(_, c, _) => Some(c),
            _ => None,
        }
    }

    fn trained(&self) -> Option<&Trained<T>> {
        match self {
            ModelStage::Trained(_, _, t) => Some(t),
            _ => None,
        }
    }
}

/// A training run on its worker thread.
struct TrainingRun<T: Trainer> {
    id: u64,
    epoch_rx: Receiver<EpochStats>,
    done_rx: Receiver<Result<Trained<T>>>,
    stop_flag: Arc<AtomicBool>,
}

impl<T: Trainer> TrainingRun<T> {
    fn cancel(self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        info!("training run {} cancelled", self.id);
    }
}

/// Owns the two batch slots and drives the model through
/// `prepare → compile → train → test / predict`.
///
/// Nothing here blocks except `wait_for_training`. Background work (batch
/// preparation and training) reports over channels that are drained in
/// [`Orchestrator::poll`], so every observable field changes on the owner's
/// thread only.
pub struct Orchestrator<T: Trainer> {
    trainer: Arc<T>,
    config: Config,
    training_data: BatchPreparer,
    prediction_data: BatchPreparer,
    stage: ModelStage<T>,
    training_run: Option<TrainingRun<T>>,
    runs_started: u64,
    epoch_history: Vec<EpochStats>,
    model_status: String,
    accuracy: Option<f32>,
}

impl<T: Trainer> Orchestrator<T> {
    /// Validates `config` and hands `config.model_dir` to the trainer as the
    /// place for compiled artifacts.
    pub fn new(mut trainer: T, config: Config) -> Result<Self> {
        config.validate()?;
        trainer.set_model_dir(&config.model_dir);
        if config.target_mode != trainer.target_mode() {
            warn!(
                "batches will be encoded as {:?} but the trainer expects {:?}",
                config.target_mode,
                trainer.target_mode()
            );
        }
        let options = PreparationOptions {
            target_mode: config.target_mode,
            progress_interval: config.progress_interval,
        };
        Ok(Orchestrator {
            trainer: Arc::new(trainer),
            training_data: BatchPreparer::new("training", &config.train_csv, options),
            prediction_data: BatchPreparer::new("prediction", &config.test_csv, options),
            config,
            stage: ModelStage::Created,
            training_run: None,
            runs_started: 0,
            epoch_history: Vec::new(),
            model_status: "Not prepared".to_string(),
            accuracy: None,
        })
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ── Batches ──────────────────────────────────────────────────────────

    pub fn start_training_batch(&mut self) {
        self.training_data.start();
    }

    pub fn start_prediction_batch(&mut self) {
        self.prediction_data.start();
    }

    pub fn training_status(&self) -> BatchPreparationStatus {
        self.training_data.status()
    }

    pub fn prediction_status(&self) -> BatchPreparationStatus {
        self.prediction_data.status()
    }

    pub fn training_data(&mut self) -> &mut BatchPreparer {
        &mut self.training_data
    }

    pub fn prediction_data(&mut self) -> &mut BatchPreparer {
        &mut self.prediction_data
    }

    pub fn data_files(&self) -> DataFiles {
        DataFiles::new(self.training_data.source(), self.prediction_data.source())
    }

    /// Applies everything the background workers have published so far.
    ///
    /// All three sources are drained even when one of them reports a
    /// failure; the first failure is returned.
    pub fn poll(&mut self) -> Result<()> {
        let training = self.training_data.poll().map(|_| ());
        let prediction = self.prediction_data.poll().map(|_| ());
        let model = self.poll_training();
        training.and(prediction).and(model)
    }

    // ── Model lifecycle ──────────────────────────────────────────────────

    /// Builds the default digit classifier from the configured hidden width
    /// and epoch count.
    pub fn prepare_model(&mut self) {
        let definition = define_model(self.config.hidden_units, self.config.epochs)
            .with_optimizer(self.config.schedule(), self.config.batch_size);
        self.prepare_model_with(definition);
    }

    /// Accepts a custom definition. Any compiled or trained model, any
    /// running training, and the last accuracy are discarded.
    pub fn prepare_model_with(&mut self, definition: ModelDefinition) {
        self.cancel_training();
        self.accuracy = None;
        self.epoch_history.clear();
        info!(
            "model '{}' prepared: {} layers, {} epochs",
            definition.name,
            definition.layers.len(),
            definition.epochs
        );
        self.stage = ModelStage::Prepared(Prepared::new(definition));
        self.model_status = "Model prepared".to_string();
    }

    /// Compiles the prepared definition. On failure the model stays prepared
    /// and the status carries the diagnostic.
    pub fn compile_model(&mut self) -> Result<()> {
        let Some(prepared) = self.stage.prepared().cloned() else {
            return Err(Error::Usage("compile requires a prepared model".into()));
        };
        self.cancel_training();
        self.accuracy = None;

        match prepared.compile(&*self.trainer) {
            Ok(compiled) => {
                self.stage = ModelStage::Compiled(prepared, compiled);
                self.model_status = "Model compiled".to_string();
                Ok(())
            }
            Err(e) => {
                warn!("compilation failed: {}", e);
                self.model_status = format!("Compilation failed: {}", e);
                self.stage = ModelStage::Prepared(prepared);
                Err(e)
            }
        }
    }

    /// Starts training on a worker thread and returns immediately.
    ///
    /// Requires a compiled model and a ready training batch. Retraining a
    /// trained model first drops it back to compiled, so `predict` reports
    /// [`Error::Untrained`] until the new run succeeds.
    pub fn train_model(&mut self) -> Result<()> {
        let (prepared, compiled) = match &self.stage {
            ModelStage::Compiled(p, c) | ModelStage::Trained(p, c, _) => (p.clone(), c.clone()),
            _ => return Err(Error::Usage("train requires a compiled model".into())),
        };
        let Some(batch) = self.training_data.batch() else {
            return Err(Error::Usage(format!(
                "training batch is not ready ({})",
                self.training_data.status()
            )));
        };
        let expected = self.trainer.target_mode();
        if batch.target_mode() != expected {
            return Err(Error::TargetMode { expected, found: batch.target_mode() });
        }

        self.cancel_training();
        self.accuracy = None;
        self.epoch_history.clear();
        self.stage = ModelStage::Compiled(prepared.clone(), compiled.clone());

        self.runs_started += 1;
        let id = self.runs_started;
        let (epoch_tx, epoch_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let stop_flag = Arc::new(AtomicBool::new(false));

        let mut train_config = TrainConfig::from_definition(prepared.definition()).with_seed(self.config.seed);
        train_config.progress_tx = Some(epoch_tx);
        train_config.stop_flag = Some(stop_flag.clone());

        info!(
            "training run {} started: {} samples, {} epochs",
            id,
            batch.count(),
            train_config.epochs
        );
        self.model_status = format!("Training 0/{}", train_config.epochs);
        self.training_run = Some(TrainingRun { id, epoch_rx, done_rx, stop_flag });

        let trainer = self.trainer.clone();
        thread::spawn(move || {
            let result = compiled.train(&*trainer, &batch, &train_config);
            // Closes the epoch channel before the result is published.
            drop(train_config);
            let _ = done_tx.send(result);
        });
        Ok(())
    }

    pub fn is_training(&self) -> bool {
        self.training_run.is_some()
    }

    /// Blocks until the current training run finishes, applying its epoch
    /// reports as they arrive.
    pub fn wait_for_training(&mut self) -> Result<()> {
        let Some(run) = &self.training_run else {
            return match self.stage {
                ModelStage::Trained(..) => Ok(()),
                _ => Err(Error::Usage("no training run has been started".into())),
            };
        };
        while let Ok(stats) = run.epoch_rx.recv() {
            self.model_status = stats.status_line();
            self.epoch_history.push(stats);
        }
        let outcome = run.done_rx.recv();
        match outcome {
            Ok(result) => self.finish_training(result),
            Err(_) => Err(self.training_lost()),
        }
    }

    /// Accuracy of the trained model on the prediction batch. The value is
    /// also kept for [`Orchestrator::accuracy_label`].
    pub fn test_model(&mut self) -> Result<f32> {
        let Some(trained) = self.stage.trained() else {
            return Err(Error::Untrained);
        };
        let Some(batch) = self.prediction_data.batch() else {
            return Err(Error::Usage(format!(
                "prediction batch is not ready ({})",
                self.prediction_data.status()
            )));
        };
        let accuracy = trained.evaluate(&*self.trainer, &batch)?;
        info!("accuracy on {} samples: {:.2}%", batch.count(), accuracy * 100.0);
        self.accuracy = Some(accuracy);
        Ok(accuracy)
    }

    /// The digit the trained model assigns to `image`.
    pub fn predict(&self, image: &ImageTensor) -> Result<u8> {
        match self.stage.trained() {
            Some(trained) => trained.predict(&*self.trainer, image),
            None => Err(Error::Untrained),
        }
    }

    // ── Observable state ─────────────────────────────────────────────────

    pub fn is_model_prepared(&self) -> bool {
        self.stage.prepared().is_some()
    }

    pub fn is_model_compiled(&self) -> bool {
        self.stage.compiled().is_some()
    }

    pub fn is_model_trained(&self) -> bool {
        self.stage.trained().is_some()
    }

    pub fn definition(&self) -> Option<&ModelDefinition> {
        self.stage.prepared().map(Prepared::definition)
    }

    pub fn trained(&self) -> Option<&Trained<T>> {
        self.stage.trained()
    }

    pub fn model_status(&self) -> &str {
        &self.model_status
    }

    /// Epoch reports of the latest training run.
    pub fn epoch_history(&self) -> &[EpochStats] {
        &self.epoch_history
    }

    pub fn accuracy(&self) -> Option<f32> {
        self.accuracy
    }

    /// "Accuracy: 97.31%", or "-" before the model has been tested.
    pub fn accuracy_label(&self) -> String {
        match self.accuracy {
            Some(a) => format!("Accuracy: {:.2}%", a * 100.0),
            None => "-".to_string(),
        }
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn poll_training(&mut self) -> Result<()> {
        let Some(run) = &self.training_run else {
            return Ok(());
        };
        for stats in run.epoch_rx.try_iter() {
            self.model_status = stats.status_line();
            self.epoch_history.push(stats);
        }
        match run.done_rx.try_recv() {
            Ok(result) => {
                // Reports sent just before completion.
                for stats in run.epoch_rx.try_iter() {
                    self.model_status = stats.status_line();
                    self.epoch_history.push(stats);
                }
                self.finish_training(result)
            }
            Err(TryRecvError::Empty) => Ok(()),
            Err(TryRecvError::Disconnected) => Err(self.training_lost()),
        }
    }

    fn finish_training(&mut self, result: Result<Trained<T>>) -> Result<()> {
        let Some(run) = self.training_run.take() else {
            return Ok(());
        };
        match result {
            Ok(trained) => {
                let (prepared, compiled) = match std::mem::replace(&mut self.stage, ModelStage::Created) {
                    ModelStage::Compiled(p, c) | ModelStage::Trained(p, c, _) => (p, c),
                    other => {
                        self.stage = other;
                        return Err(Error::Usage("training finished without a compiled model".into()));
                    }
                };
                info!("training run {} finished", run.id);
                self.stage = ModelStage::Trained(prepared, compiled, trained);
                self.model_status = "Trained".to_string();
                Ok(())
            }
            Err(e) => {
                warn!("training run {} failed: {}", run.id, e);
                self.model_status = format!("Training failed: {}", e);
                Err(e)
            }
        }
    }

    fn training_lost(&mut self) -> Error {
        self.training_run = None;
        let err = Error::WorkerLost { task: "training" };
        self.model_status = format!("Training failed: {}", err);
        err
    }

    fn cancel_training(&mut self) {
        if let Some(run) = self.training_run.take() {
            run.cancel();
        }
    }
}

impl<T: Trainer> Drop for Orchestrator<T> {
    fn drop(&mut self) {
        self.cancel_training();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::CpuTrainer;

    fn orchestrator() -> Orchestrator<CpuTrainer> {
        let config = Config {
            train_csv: "/no/such/train.csv".into(),
            test_csv: "/no/such/test.csv".into(),
            epochs: 1,
            hidden_units: 50,
            ..Config::default()
        };
        Orchestrator::new(CpuTrainer::new(), config).unwrap()
    }

    #[test]
    fn starts_with_nothing_prepared() {
        let orch = orchestrator();
        assert_eq!(orch.model_status(), "Not prepared");
        assert_eq!(orch.training_status(), BatchPreparationStatus::NotPrepared);
        assert_eq!(orch.accuracy_label(), "-");
        assert!(!orch.is_model_prepared());
        assert!(matches!(orch.predict(&ImageTensor::zeros()), Err(Error::Untrained)));
    }

    #[test]
    fn stages_must_be_entered_in_order() {
        let mut orch = orchestrator();
        assert!(matches!(orch.compile_model(), Err(Error::Usage(_))));
        assert!(matches!(orch.train_model(), Err(Error::Usage(_))));

        orch.prepare_model();
        assert!(orch.is_model_prepared() && !orch.is_model_compiled());
        orch.compile_model().unwrap();
        assert_eq!(orch.model_status(), "Model compiled");

        // No training batch yet.
        assert!(matches!(orch.train_model(), Err(Error::Usage(_))));
        assert!(matches!(orch.test_model(), Err(Error::Untrained)));
    }

    #[test]
    fn re_preparing_invalidates_later_stages() {
        let mut orch = orchestrator();
        orch.prepare_model();
        orch.compile_model().unwrap();
        orch.prepare_model();
        assert!(orch.is_model_prepared());
        assert!(!orch.is_model_compiled());
        assert_eq!(orch.model_status(), "Model prepared");
    }

    #[test]
    fn compile_writes_the_artifact_into_the_configured_model_dir() {
        let dir = std::env::temp_dir().join(format!("ferrite-digits-orch-{}", std::process::id()));
        let config = Config { model_dir: dir.clone(), epochs: 1, hidden_units: 50, ..Config::default() };
        let mut orch = Orchestrator::new(CpuTrainer::new(), config).unwrap();
        assert_eq!(orch.trainer().model_dir(), Some(dir.as_path()));

        orch.prepare_model_with(define_model(50, 1).with_name("configured_dir"));
        orch.compile_model().unwrap();
        assert!(dir.join("configured_dir.json").is_file());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn compile_failure_keeps_the_model_prepared() {
        let mut orch = orchestrator();
        let mut definition = define_model(50, 1);
        definition.layers.remove(6);
        orch.prepare_model_with(definition);
        assert!(matches!(orch.compile_model(), Err(Error::Compilation(_))));
        assert!(orch.is_model_prepared());
        assert!(!orch.is_model_compiled());
        assert!(orch.model_status().starts_with("Compilation failed"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = Config { epochs: 0, ..Config::default() };
        assert!(matches!(Orchestrator::new(CpuTrainer::new(), config), Err(Error::Config(_))));
    }
}
