//! Multi-layer perceptron with hand-written back-propagation.

use ndarray::{Array1, Array2, Axis, Zip};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Hidden activation; the output layer is always linear
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Tanh,
    Relu,
}

impl Activation {
    fn apply(self, z: &mut Array2<f32>) {
        match self {
            Activation::Tanh => z.mapv_inplace(f32::tanh),
            Activation::Relu => z.mapv_inplace(|x| x.max(0.0)),
        }
    }

    /// Derivative expressed through the activation's output
    fn derivative(self, out: f32) -> f32 {
        match self {
            Activation::Tanh => 1.0 - out * out,
            Activation::Relu => {
                if out > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Fully connected layer: `y = x · W + b`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    /// (input_size x output_size)
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

impl Dense {
    /// Gaussian init with standard deviation `gain / sqrt(input_size)`
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, gain: f32, rng: &mut R) -> Self {
        let std = gain / (input_size.max(1) as f32).sqrt();
        let weights = match Normal::new(0.0, std) {
            Ok(normal) => Array2::from_shape_fn((input_size, output_size), |_| normal.sample(rng)),
            Err(_) => Array2::zeros((input_size, output_size)),
        };
        Self {
            weights,
            biases: Array1::zeros(output_size),
        }
    }

    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        input.dot(&self.weights) + &self.biases
    }
}

/// Gradients of every layer of an [`Mlp`], in layer order.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub layers: Vec<(Array2<f32>, Array1<f32>)>,
}

impl Gradients {
    pub fn zeros_like(mlp: &Mlp) -> Self {
        Self {
            layers: mlp
                .layers
                .iter()
                .map(|l| (Array2::zeros(l.weights.raw_dim()), Array1::zeros(l.biases.len())))
                .collect(),
        }
    }

    /// Sum of squared entries
    pub fn squared_norm(&self) -> f32 {
        self.layers
            .iter()
            .map(|(w, b)| w.iter().map(|x| x * x).sum::<f32>() + b.iter().map(|x| x * x).sum::<f32>())
            .sum()
    }

    pub fn scale(&mut self, factor: f32) {
        for (w, b) in &mut self.layers {
            w.mapv_inplace(|x| x * factor);
            b.mapv_inplace(|x| x * factor);
        }
    }
}

/// Intermediate activations kept by [`Mlp::forward_cached`].
pub struct ForwardCache {
    /// Input of every layer; entry 0 is the network input
    inputs: Vec<Array2<f32>>,
}

/// A stack of dense layers with a shared hidden activation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Dense>,
    activation: Activation,
}

impl Mlp {
    /// Build `input -> hidden[0] -> ... -> output`.
    ///
    /// `output_gain` scales the initial output layer; a small gain gives a
    /// near-uniform initial policy.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden: &[usize],
        output_size: usize,
        activation: Activation,
        output_gain: f32,
        rng: &mut R,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut in_size = input_size;
        for &size in hidden {
            layers.push(Dense::new(in_size, size, 1.0, rng));
            in_size = size;
        }
        layers.push(Dense::new(in_size, output_size, output_gain, rng));
        Self { layers, activation }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.weights.nrows())
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.biases.len())
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Dense] {
        &mut self.layers
    }

    pub fn num_parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.biases.len())
            .sum()
    }

    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        self.forward_cached(input).0
    }

    /// Forward pass that also returns what [`Mlp::backward`] needs
    pub fn forward_cached(&self, input: &Array2<f32>) -> (Array2<f32>, ForwardCache) {
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut x = input.clone();
        let last = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = layer.forward(&x);
            if i < last {
                self.activation.apply(&mut z);
            }
            inputs.push(std::mem::replace(&mut x, z));
        }
        (x, ForwardCache { inputs })
    }

    /// Gradients of the parameters given dL/d(output).
    pub fn backward(&self, cache: &ForwardCache, grad_output: &Array2<f32>) -> Gradients {
        let mut grads = Vec::with_capacity(self.layers.len());
        let mut delta = grad_output.clone();

        for (i, layer) in self.layers.iter().enumerate().rev() {
            let input = &cache.inputs[i];
            grads.push((input.t().dot(&delta), delta.sum_axis(Axis(0))));

            if i > 0 {
                // input of layer i is the activated output of layer i - 1
                let mut upstream = delta.dot(&layer.weights.t());
                Zip::from(&mut upstream)
                    .and(input)
                    .for_each(|g, &out| *g *= self.activation.derivative(out));
                delta = upstream;
            }
        }

        grads.reverse();
        Gradients { layers: grads }
    }
}
