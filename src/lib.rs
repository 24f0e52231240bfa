pub mod math;
pub mod activation;
pub mod layers;
pub mod loss;
pub mod optim;
pub mod model;
pub mod train;
pub mod data;
pub mod orchestrator;
pub mod canvas;
pub mod config;
pub mod error;

// Convenience re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use data::{Batch, BatchPreparationStatus, BatchPreparer, DataFiles, ImageTensor, TargetMode};
pub use model::{define_model, ModelDefinition, Network};
pub use train::{CpuTrainer, EpochStats, TrainConfig, Trainer};
pub use orchestrator::Orchestrator;
pub use canvas::{image_bytes_to_tensor, Canvas, CanvasAdapter};
