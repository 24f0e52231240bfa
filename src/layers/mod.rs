pub mod conv;
pub mod dense;
pub mod pool;

use serde::{Deserialize, Serialize};

use crate::activation::{softmax, ActivationFunction};
use crate::math::Shape;
use crate::optim::Sgd;

pub use conv::{Conv2d, ConvGrads};
pub use dense::{Dense, DenseGrads};
pub use pool::MaxPool2d;

/// One executable stage of a network, carrying its own weights (if any).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    Activation(ActivationFunction),
    Flatten,
    Dense(Dense),
    /// Output softmax. Its backward pass is the identity because the
    /// cross-entropy derivative already yields ∂L/∂logits.
    Softmax,
}

/// Gradient accumulator matching a [`Layer`]; parameter-free layers carry none.
#[derive(Debug, Clone)]
pub enum LayerGrads {
    None,
    Conv2d(ConvGrads),
    Dense(DenseGrads),
}

impl Layer {
    pub fn forward(&self, input: &[f32], in_shape: Shape, out_shape: Shape) -> Vec<f32> {
        match self {
            Layer::Conv2d(conv) => conv.forward(input, in_shape, out_shape),
            Layer::MaxPool2d(pool) => pool.forward(input, in_shape, out_shape),
            Layer::Activation(f) => input.iter().map(|&x| f.function(x)).collect(),
            Layer::Flatten => input.to_vec(),
            Layer::Dense(dense) => dense.forward(input),
            Layer::Softmax => softmax(input),
        }
    }

    pub fn zero_grads(&self) -> LayerGrads {
        match self {
            Layer::Conv2d(conv) => LayerGrads::Conv2d(conv.zero_grads()),
            Layer::Dense(dense) => LayerGrads::Dense(dense.zero_grads()),
            _ => LayerGrads::None,
        }
    }

    /// Accumulates this sample's parameter gradients into `grads` and
    /// returns ∂L/∂input. `input` is the value `forward` received.
    pub fn backward(
        &self,
        delta: &[f32],
        input: &[f32],
        in_shape: Shape,
        out_shape: Shape,
        grads: &mut LayerGrads,
    ) -> Vec<f32> {
        match (self, grads) {
            (Layer::Conv2d(conv), LayerGrads::Conv2d(g)) => {
                conv.compute_gradients(delta, input, in_shape, out_shape, g)
            }
            (Layer::Dense(dense), LayerGrads::Dense(g)) => dense.compute_gradients(delta, input, g),
            (Layer::MaxPool2d(pool), _) => pool.backward(delta, input, in_shape, out_shape),
            (Layer::Activation(f), _) => delta.iter().zip(input)
                .map(|(d, &z)| d * f.derivative(z))
                .collect(),
            (Layer::Flatten, _) | (Layer::Softmax, _) => delta.to_vec(),
            (layer, _) => unreachable!("gradient buffer does not match layer {:?}", layer.kind()),
        }
    }

    pub fn apply_gradients(&mut self, grads: &LayerGrads, scale: f32, optimizer: &Sgd) {
        match (self, grads) {
            (Layer::Conv2d(conv), LayerGrads::Conv2d(g)) => conv.apply_gradients(g, scale, optimizer),
            (Layer::Dense(dense), LayerGrads::Dense(g)) => dense.apply_gradients(g, scale, optimizer),
            _ => {}
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Conv2d(_) => "conv2d",
            Layer::MaxPool2d(_) => "max_pool2d",
            Layer::Activation(_) => "activation",
            Layer::Flatten => "flatten",
            Layer::Dense(_) => "dense",
            Layer::Softmax => "softmax",
        }
    }
}
