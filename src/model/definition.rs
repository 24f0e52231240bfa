use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::activation::ActivationFunction;
use crate::data::{IMAGE_SIDE, NUM_CLASSES};
use crate::error::{Error, Result};
use crate::layers::conv::conv_output_len;
use crate::layers::pool::pool_output_len;
use crate::math::Shape;
use crate::optim::LearningRateSchedule;

/// Describes one stage of a model graph.
///
/// Layers that carry weights also declare the input width they expect
/// (`in_channels` for convolutions, `input_size` for dense layers); compilation
/// checks those declarations against the shape actually flowing in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        in_channels: usize,
        filters: usize,
        kernel: usize,
        #[serde(default = "one")]
        stride: usize,
        #[serde(default)]
        padding: usize,
    },
    MaxPool2d { size: usize, stride: usize },
    Activation { function: ActivationFunction },
    Flatten,
    Dense { input_size: usize, units: usize },
    Softmax,
}

fn one() -> usize {
    1
}

/// Optimizer hyperparameters attached to a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSpec {
    pub schedule: LearningRateSchedule,
    pub batch_size: usize,
}

impl Default for OptimizerSpec {
    fn default() -> Self {
        OptimizerSpec { schedule: LearningRateSchedule::default(), batch_size: 32 }
    }
}

/// A serializable model graph plus its training hyperparameters.
///
/// Pure data: building one does no I/O and allocates no weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Used as the file stem of the compiled artifact.
    pub name: String,
    pub input_shape: Shape,
    /// Ordered list of stages (input → output).
    pub layers: Vec<LayerSpec>,
    pub optimizer: OptimizerSpec,
    pub epochs: usize,
}

/// The digit classifier: two conv → ReLU → max-pool stages, then
/// `hidden_units` fully-connected ReLU units and a 10-way softmax.
///
/// 1×28×28 → 8×28×28 → 8×14×14 → 16×14×14 → 16×7×7 → 784 → hidden → 10
pub fn define_model(hidden_units: usize, epochs: usize) -> ModelDefinition {
    let relu = || LayerSpec::Activation { function: ActivationFunction::ReLU };
    let flattened = 16 * (IMAGE_SIDE / 4) * (IMAGE_SIDE / 4);
    ModelDefinition {
        name: "mnist_digits".into(),
        input_shape: Shape::new(1, IMAGE_SIDE, IMAGE_SIDE),
        layers: vec![
            LayerSpec::Conv2d { in_channels: 1, filters: 8, kernel: 3, stride: 1, padding: 1 },
            relu(),
            LayerSpec::MaxPool2d { size: 2, stride: 2 },
            LayerSpec::Conv2d { in_channels: 8, filters: 16, kernel: 3, stride: 1, padding: 1 },
            relu(),
            LayerSpec::MaxPool2d { size: 2, stride: 2 },
            LayerSpec::Flatten,
            LayerSpec::Dense { input_size: flattened, units: hidden_units },
            relu(),
            LayerSpec::Dense { input_size: hidden_units, units: NUM_CLASSES },
            LayerSpec::Softmax,
        ],
        optimizer: OptimizerSpec::default(),
        epochs,
    }
}

impl ModelDefinition {
    pub fn with_optimizer(mut self, schedule: LearningRateSchedule, batch_size: usize) -> Self {
        self.optimizer = OptimizerSpec { schedule, batch_size };
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Walks the graph and returns the shape entering each layer followed by
    /// the final output shape (`layers.len() + 1` entries).
    ///
    /// Fails with [`Error::Compilation`] on any dimension mismatch: a weight
    /// layer whose declared input width differs from what flows in, a window
    /// larger than its input, a dense layer fed an unflattened volume, a
    /// softmax anywhere but last, or an output that is not 10 classes wide.
    pub fn infer_shapes(&self) -> Result<Vec<Shape>> {
        let fail = |i: usize, msg: String| Err(Error::Compilation(format!("layer {}: {}", i, msg)));

        if self.input_shape.is_empty() {
            return Err(Error::Compilation(format!("empty input shape {}", self.input_shape)));
        }
        if self.layers.is_empty() {
            return Err(Error::Compilation("model has no layers".into()));
        }
        if self.epochs == 0 {
            return Err(Error::Compilation("epoch count must be at least 1".into()));
        }
        if self.optimizer.batch_size == 0 {
            return Err(Error::Compilation("batch size must be at least 1".into()));
        }

        let mut shapes = Vec::with_capacity(self.layers.len() + 1);
        let mut current = self.input_shape;
        shapes.push(current);

        for (i, layer) in self.layers.iter().enumerate() {
            current = match *layer {
                LayerSpec::Conv2d { in_channels, filters, kernel, stride, padding } => {
                    if in_channels != current.channels {
                        return fail(i, format!(
                            "conv2d declares {} input channels but receives {}",
                            in_channels, current
                        ));
                    }
                    if filters == 0 {
                        return fail(i, "conv2d needs at least one filter".into());
                    }
                    match (
                        conv_output_len(current.height, kernel, stride, padding),
                        conv_output_len(current.width, kernel, stride, padding),
                    ) {
                        (Some(h), Some(w)) => Shape::new(filters, h, w),
                        _ => return fail(i, format!(
                            "conv2d kernel {} stride {} padding {} does not fit input {}",
                            kernel, stride, padding, current
                        )),
                    }
                }
                LayerSpec::MaxPool2d { size, stride } => {
                    match (
                        pool_output_len(current.height, size, stride),
                        pool_output_len(current.width, size, stride),
                    ) {
                        (Some(h), Some(w)) => Shape::new(current.channels, h, w),
                        _ => return fail(i, format!(
                            "max_pool2d window {} stride {} does not fit input {}",
                            size, stride, current
                        )),
                    }
                }
                LayerSpec::Activation { .. } => current,
                LayerSpec::Flatten => Shape::flat(current.len()),
                LayerSpec::Dense { input_size, units } => {
                    if !current.is_flat() {
                        return fail(i, format!("dense layer receives unflattened input {}", current));
                    }
                    if input_size != current.len() {
                        return fail(i, format!(
                            "dense layer declares input size {} but the preceding stage produces {}",
                            input_size,
                            current.len()
                        ));
                    }
                    if units == 0 {
                        return fail(i, "dense layer needs at least one unit".into());
                    }
                    Shape::flat(units)
                }
                LayerSpec::Softmax => {
                    if i + 1 != self.layers.len() {
                        return fail(i, "softmax must be the final layer".into());
                    }
                    current
                }
            };
            shapes.push(current);
        }

        if current != Shape::flat(NUM_CLASSES) {
            return Err(Error::Compilation(format!(
                "model output is {} but {} class scores are required",
                current, NUM_CLASSES
            )));
        }
        if self.layers.last() != Some(&LayerSpec::Softmax) {
            return Err(Error::Compilation("model must end in a softmax layer".into()));
        }
        Ok(shapes)
    }

    /// Serializes the definition to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `ModelDefinition` from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<ModelDefinition> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_shapes_line_up() {
        let def = define_model(100, 3);
        let shapes = def.infer_shapes().unwrap();
        assert_eq!(shapes.len(), def.layers.len() + 1);
        assert_eq!(shapes[3], Shape::new(8, 14, 14));
        assert_eq!(shapes[7], Shape::flat(784));
        assert_eq!(*shapes.last().unwrap(), Shape::flat(10));
    }

    #[test]
    fn mismatched_dense_input_is_rejected() {
        let mut def = define_model(100, 1);
        def.layers[7] = LayerSpec::Dense { input_size: 800, units: 100 };
        let err = def.infer_shapes().unwrap_err();
        assert!(matches!(err, Error::Compilation(ref m) if m.contains("800")));
    }

    #[test]
    fn dense_without_flatten_is_rejected() {
        let mut def = define_model(100, 1);
        def.layers.remove(6);
        assert!(matches!(def.infer_shapes(), Err(Error::Compilation(_))));
    }

    #[test]
    fn wrong_conv_channels_and_oversized_pool_are_rejected() {
        let mut def = define_model(100, 1);
        def.layers[3] = LayerSpec::Conv2d { in_channels: 4, filters: 16, kernel: 3, stride: 1, padding: 1 };
        assert!(matches!(def.infer_shapes(), Err(Error::Compilation(_))));

        let mut def = define_model(100, 1);
        def.layers[2] = LayerSpec::MaxPool2d { size: 40, stride: 2 };
        assert!(matches!(def.infer_shapes(), Err(Error::Compilation(_))));
    }

    #[test]
    fn misplaced_softmax_and_wrong_class_count_are_rejected() {
        let mut def = define_model(100, 1);
        def.layers.insert(7, LayerSpec::Softmax);
        assert!(matches!(def.infer_shapes(), Err(Error::Compilation(_))));

        let mut def = define_model(100, 1);
        def.layers[9] = LayerSpec::Dense { input_size: 100, units: 12 };
        assert!(matches!(def.infer_shapes(), Err(Error::Compilation(_))));
    }

    #[test]
    fn definition_roundtrips_through_json() {
        let def = define_model(75, 2);
        let json = serde_json::to_string(&def).unwrap();
        let back: ModelDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);
    }
}
