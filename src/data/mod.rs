pub mod batch;
pub mod encoder;
pub mod files;
pub mod preparation;
pub mod reader;
pub mod sample;

pub use batch::{Batch, BatchBuilder};
pub use encoder::{encode, one_hot, EncodedSample, Target, TargetMode};
pub use files::{size_label, DataFiles};
pub use preparation::{BatchPreparationStatus, BatchPreparer, PreparationOptions};
pub use reader::DatasetReader;
pub use sample::{ImageTensor, Sample, IMAGE_PIXELS, IMAGE_SIDE, NUM_CLASSES};
