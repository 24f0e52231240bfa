use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layers::{Conv2d, Dense, Layer, LayerGrads};
use crate::math::Shape;
use crate::model::definition::{LayerSpec, ModelDefinition};
use crate::optim::Sgd;

/// An executable network: validated shapes plus weighted layers.
///
/// `shapes[i]` is the shape entering `layers[i]`; the last entry is the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub shapes: Vec<Shape>,
    pub layers: Vec<Layer>,
}

/// Per-layer inputs recorded by [`Network::forward_trace`] for backprop.
pub struct Trace {
    /// `activations[i]` is the input of layer `i`; the last entry is the output.
    pub activations: Vec<Vec<f32>>,
}

impl Trace {
    pub fn output(&self) -> &[f32] {
        self.activations.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Network {
    /// Materializes weights for a definition whose shapes were already inferred.
    ///
    /// Weight layers directly followed by a rectifier get He initialization,
    /// everything else Xavier.
    pub fn from_definition<R: Rng + ?Sized>(definition: &ModelDefinition, shapes: Vec<Shape>, rng: &mut R) -> Network {
        let specs = &definition.layers;
        let layers = specs.iter().enumerate()
            .map(|(i, spec)| {
                let rectified = matches!(
                    specs.get(i + 1),
                    Some(LayerSpec::Activation { function }) if function.is_rectifier()
                );
                match *spec {
                    LayerSpec::Conv2d { in_channels, filters, kernel, stride, padding } => {
                        Layer::Conv2d(Conv2d::new(in_channels, filters, kernel, stride, padding, rectified, rng))
                    }
                    LayerSpec::MaxPool2d { size, stride } => {
                        Layer::MaxPool2d(crate::layers::MaxPool2d { size, stride })
                    }
                    LayerSpec::Activation { function } => Layer::Activation(function),
                    LayerSpec::Flatten => Layer::Flatten,
                    LayerSpec::Dense { input_size, units } => {
                        Layer::Dense(Dense::new(input_size, units, rectified, rng))
                    }
                    LayerSpec::Softmax => Layer::Softmax,
                }
            })
            .collect();
        Network { shapes, layers }
    }

    pub fn input_len(&self) -> usize {
        self.shapes.first().map(Shape::len).unwrap_or(0)
    }

    /// Inference-only forward pass. Takes `&self`, so concurrent calls are safe.
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        let mut current = input.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            current = layer.forward(&current, self.shapes[i], self.shapes[i + 1]);
        }
        current
    }

    /// Forward pass that keeps every intermediate activation.
    pub fn forward_trace(&self, input: &[f32]) -> Trace {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.to_vec());
        for (i, layer) in self.layers.iter().enumerate() {
            let next = layer.forward(&activations[i], self.shapes[i], self.shapes[i + 1]);
            activations.push(next);
        }
        Trace { activations }
    }

    pub fn zero_grads(&self) -> Vec<LayerGrads> {
        self.layers.iter().map(Layer::zero_grads).collect()
    }

    /// Backward pass for one sample: `delta` is ∂L/∂output (for a softmax
    /// head paired with cross-entropy, `predicted - expected`).
    pub fn backward(&self, trace: &Trace, delta: Vec<f32>, grads: &mut [LayerGrads]) {
        let mut delta = delta;
        for i in (0..self.layers.len()).rev() {
            delta = self.layers[i].backward(
                &delta,
                &trace.activations[i],
                self.shapes[i],
                self.shapes[i + 1],
                &mut grads[i],
            );
        }
    }

    /// Applies accumulated gradients averaged over `batch_len` samples.
    pub fn apply_gradients(&mut self, grads: &[LayerGrads], batch_len: usize, optimizer: &Sgd) {
        let scale = 1.0 / batch_len.max(1) as f32;
        for (layer, g) in self.layers.iter_mut().zip(grads) {
            layer.apply_gradients(g, scale, optimizer);
        }
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|e| Error::io(path, e))?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Network> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let reader = std::io::BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loss::CrossEntropyLoss;
    use crate::model::define_model;
    use rand::{rngs::StdRng, SeedableRng};

    fn build(seed: u64) -> Network {
        let def = define_model(50, 1);
        let shapes = def.infer_shapes().unwrap();
        Network::from_definition(&def, shapes, &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn forward_yields_a_distribution() {
        let net = build(1);
        let out = net.forward(&vec![0.5; 784]);
        assert_eq!(out.len(), 10);
        assert!((out.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert!(out.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn trace_output_matches_inference() {
        let net = build(2);
        let input: Vec<f32> = (0..784).map(|i| (i % 7) as f32 / 7.0).collect();
        assert_eq!(net.forward_trace(&input).output(), net.forward(&input).as_slice());
    }

    #[test]
    fn one_step_reduces_loss_on_the_same_sample() {
        let mut net = build(3);
        let input: Vec<f32> = (0..784).map(|i| ((i * 31) % 255) as f32 / 255.0).collect();
        let mut target = vec![0.0; 10];
        target[4] = 1.0;

        let before = CrossEntropyLoss::loss(&net.forward(&input), &target);
        let trace = net.forward_trace(&input);
        let mut grads = net.zero_grads();
        net.backward(&trace, CrossEntropyLoss::derivative(trace.output(), &target), &mut grads);
        net.apply_gradients(&grads, 1, &Sgd::new(0.005));
        let after = CrossEntropyLoss::loss(&net.forward(&input), &target);

        assert!(after < before, "loss went from {} to {}", before, after);
    }
}
