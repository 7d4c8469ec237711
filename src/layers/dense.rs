use crate::activator::Activator;
use crate::error::{check_len, Result};
use crate::layers::Layer;
use crate::matrix::Mat;
use crate::vector::Vector;

use log::debug;
use rand::distributions::Uniform;
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

pub(crate) const TYPE_NAME: &str = "feed-forward";

const ACTIVATOR: Activator = Activator::TanH;

/// A fully connected layer of a neural network, `y = tanh(W·x + b)`.
///
/// Outputs saturate to exactly ±1.0 once `|W·x + b|` grows past about 19.
///
/// This performs efficient network updates by storing the weights for every
/// neuron as a single Matrix, one neuron per row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedForwardLayer {
    /// The network weights, `outputs × inputs`.
    weights: Mat,
    bias: Vector,
}

/// Persisted parameters, flattened row-major.
#[derive(Serialize, Deserialize)]
struct Data {
    weights: Vec<f64>,
    bias: Vec<f64>,
}

impl FeedForwardLayer {
    /// Initializes a new, untrained layer with parameters drawn uniformly
    /// from [-1, 1].
    pub fn new<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let mut layer = FeedForwardLayer::default();
        layer.resize(inputs, outputs, rng);
        layer
    }

    /// Builds a layer from explicit parameters. `weights` must have one row
    /// per element of `bias`.
    pub fn from_parameters(weights: Mat, bias: Vector) -> Result<Self> {
        check_len(weights.rows(), bias.len())?;
        Ok(FeedForwardLayer { weights, bias })
    }

    pub fn weights(&self) -> &Mat {
        &self.weights
    }

    pub fn bias(&self) -> &Vector {
        &self.bias
    }
}

impl Layer for FeedForwardLayer {
    fn input_len(&self) -> usize {
        self.weights.cols()
    }

    fn output_len(&self) -> usize {
        self.weights.rows()
    }

    fn resize<R: Rng + ?Sized>(&mut self, inputs: usize, outputs: usize, rng: &mut R) {
        debug!("initializing {} layer {} -> {}", TYPE_NAME, inputs, outputs);
        let distribution = Uniform::new_inclusive(-1.0, 1.0);
        self.weights = Mat::random(&distribution, outputs, inputs, rng);
        self.bias = Vector::random(&distribution, outputs, rng);
    }

    fn propagate(&mut self, input: &Vector) -> Result<Vector> {
        check_len(self.input_len(), input.len())?;
        let activation = self.weights.mul_vec(input)?.try_add(&self.bias)?;
        Ok(ACTIVATOR.apply(&activation))
    }

    fn train(
        &mut self,
        input: &Vector,
        output: &Vector,
        delta: &Vector,
        mutability: f64,
    ) -> Result<Vector> {
        check_len(self.input_len(), input.len())?;
        check_len(self.output_len(), output.len())?;
        check_len(self.output_len(), delta.len())?;

        let delta = delta.hadamard(&ACTIVATOR.derivative(output))?;
        let input_delta = self.weights.vec_mul(&delta)?;
        self.weights.add_outer(-mutability, &delta, input)?;
        self.bias.add_scaled(-mutability, &delta)?;
        Ok(input_delta)
    }

    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn save_data(&self) -> Result<serde_json::Value> {
        let data = Data {
            weights: self.weights.as_slice().to_vec(),
            bias: self.bias.as_slice().to_vec(),
        };
        Ok(serde_json::to_value(data)?)
    }

    fn load_data(&mut self, inputs: usize, outputs: usize, data: serde_json::Value) -> Result<()> {
        let data: Data = serde_json::from_value(data)?;
        let weights = Mat::from_row_major(outputs, inputs, data.weights)?;
        check_len(outputs, data.bias.len())?;
        self.weights = weights;
        self.bias = data.bias.into();
        Ok(())
    }
}
