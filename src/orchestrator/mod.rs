pub mod orchestrator;
pub mod stage;

pub use orchestrator::Orchestrator;
pub use stage::{Compiled, Prepared, Trained};
