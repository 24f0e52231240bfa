use serde::{Serialize, Deserialize};

/// Per-epoch training statistics emitted by `train_loop`.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, the training
/// loop sends one `EpochStats` value at the end of every completed epoch, in
/// epoch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over all samples in this epoch.
    pub train_loss: f32,
    /// Fraction of samples whose arg-max matched the label during the epoch.
    pub train_accuracy: f32,
    /// Learning rate the schedule produced for this epoch.
    pub learning_rate: f32,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

impl EpochStats {
    /// Human-readable one-liner, e.g. `Epoch 3/10 loss 0.4213`.
    pub fn status_line(&self) -> String {
        format!("Epoch {}/{} loss {:.4}", self.epoch, self.total_epochs, self.train_loss)
    }
}
