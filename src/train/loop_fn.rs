use std::sync::atomic::Ordering;
use std::time::Instant;

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::{Batch, Target, NUM_CLASSES};
use crate::error::{Error, Result};
use crate::loss::CrossEntropyLoss;
use crate::math::argmax;
use crate::model::Network;
use crate::optim::Sgd;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Trains `network` for `config.epochs` epochs with mini-batch SGD and
/// softmax cross-entropy, returning the mean loss of the last epoch.
///
/// # Early termination
/// The run ends with [`Error::TrainingFailure`] if:
/// - `config.stop_flag` is set (checked before every mini-batch),
/// - the `progress_tx` receiver has been dropped, or
/// - the loss stops being finite.
pub fn train_loop<R: Rng + ?Sized>(
    network: &mut Network,
    batch: &Batch,
    config: &TrainConfig,
    rng: &mut R,
) -> Result<f32> {
    if batch.is_empty() {
        return Err(Error::TrainingFailure("training batch is empty".into()));
    }
    if config.batch_size == 0 {
        return Err(Error::TrainingFailure("batch size must be at least 1".into()));
    }

    let mut last_train_loss = 0.0;

    for epoch in 1..=config.epochs {
        if stop_requested(config) {
            return Err(Error::TrainingFailure(format!("cancelled before epoch {}", epoch)));
        }

        let t_start = Instant::now();
        let optimizer = Sgd::new(config.schedule.rate(epoch));

        // ── One full pass over the training data ───────────────────────────
        let Some((train_loss, train_accuracy)) = run_one_epoch(network, batch, &optimizer, config, rng) else {
            return Err(Error::TrainingFailure(format!("cancelled during epoch {}", epoch)));
        };
        if !train_loss.is_finite() {
            return Err(Error::TrainingFailure(format!("loss diverged at epoch {}", epoch)));
        }
        last_train_loss = train_loss;

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            train_accuracy,
            learning_rate: optimizer.learning_rate,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };
        debug!("{} acc {:.3} ({} ms)", stats.status_line(), train_accuracy, stats.elapsed_ms);

        // ── Emit progress ─────────────────────────────────────────────────
        if let Some(ref tx) = config.progress_tx {
            if tx.send(stats).is_err() {
                return Err(Error::TrainingFailure("progress receiver dropped".into()));
            }
        }
    }

    if stop_requested(config) {
        return Err(Error::TrainingFailure("cancelled after the last epoch".into()));
    }
    Ok(last_train_loss)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn stop_requested(config: &TrainConfig) -> bool {
    config.stop_flag.as_ref().map_or(false, |flag| flag.load(Ordering::Relaxed))
}

/// Target as a probability distribution over the ten digits.
fn expected_distribution(target: &Target) -> [f32; NUM_CLASSES] {
    match target {
        Target::OneHot(v) => *v,
        Target::Scalar(label) => {
            let mut v = [0.0; NUM_CLASSES];
            v[(*label as usize).min(NUM_CLASSES - 1)] = 1.0;
            v
        }
    }
}

/// Runs one shuffled epoch of mini-batch SGD.
/// Returns (mean loss, fraction classified correctly while training), or
/// `None` if the stop flag was raised part-way through.
fn run_one_epoch<R: Rng + ?Sized>(
    network: &mut Network,
    batch: &Batch,
    optimizer: &Sgd,
    config: &TrainConfig,
    rng: &mut R,
) -> Option<(f32, f32)> {
    let samples = batch.samples();
    let n = samples.len();
    let mut total_loss = 0.0;
    let mut correct = 0usize;

    // Shuffle sample order each epoch; image/target pairs move together.
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);

    for chunk in indices.chunks(config.batch_size) {
        if stop_requested(config) {
            return None;
        }
        let mut acc_grads = network.zero_grads();

        for &idx in chunk {
            let sample = &samples[idx];
            let expected = expected_distribution(&sample.target);

            let trace = network.forward_trace(sample.image.as_slice());
            let output = trace.output();

            total_loss += CrossEntropyLoss::loss(output, &expected);
            if argmax(output) == Some(sample.target.label() as usize) {
                correct += 1;
            }

            let delta = CrossEntropyLoss::derivative(output, &expected);
            network.backward(&trace, delta, &mut acc_grads);
        }

        network.apply_gradients(&acc_grads, chunk.len(), optimizer);
    }

    Some((total_loss / n as f32, correct as f32 / n as f32))
}
