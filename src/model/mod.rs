pub mod definition;
pub mod network;

pub use definition::{define_model, LayerSpec, ModelDefinition, OptimizerSpec};
pub use network::{Network, Trace};
