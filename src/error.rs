use std::path::PathBuf;

use thiserror::Error;

/// Every failure the pipeline, the orchestrator and the trainer can report.
#[derive(Debug, Error)]
pub enum Error {
    /// The dataset (or a model artifact) could not be opened, read or written.
    #[error("i/o error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV row had the wrong number of columns or a non-numeric cell.
    #[error("row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    /// A label fell outside the digit range [0, 9].
    #[error("label {label} is outside the digit range 0..=9")]
    EncodingRange { label: i64 },

    /// The model definition is structurally inconsistent.
    #[error("compilation failed: {0}")]
    Compilation(String),

    /// The training run did not reach its completed state.
    #[error("training failed: {0}")]
    TrainingFailure(String),

    /// A stage was invoked out of order (e.g. train before compile).
    #[error("usage error: {0}")]
    Usage(String),

    /// Prediction or evaluation was requested before a model finished training.
    #[error("model has not been trained yet")]
    Untrained,

    /// The batch target convention differs from the one the trainer binding expects.
    #[error("batch targets are {found:?} but the trainer expects {expected:?}")]
    TargetMode {
        expected: crate::data::TargetMode,
        found: crate::data::TargetMode,
    },

    /// A batch slot whose latest preparation run ended in failure.
    #[error("{slot} batch preparation failed: {reason}")]
    PreparationFailed { slot: &'static str, reason: String },

    /// A background worker vanished without reporting a result.
    #[error("{task} worker exited without reporting a result")]
    WorkerLost { task: &'static str },

    /// Configuration values out of their allowed ranges.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image bytes could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
