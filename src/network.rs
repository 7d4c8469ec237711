//! A neural network built from an ordered stack of layers.
//!
//! # Example
//!
//! Let's teach a small recurrent network to echo its previous input:
//!
//! ```
//! # use recurrent_neurons::network::NeuralNetwork;
//! # use recurrent_neurons::layers::{FeedForwardLayer, LstmLayer};
//! # use recurrent_neurons::vector::Vector;
//! let mut network = NeuralNetwork::with_seed(7);
//! let lstm = LstmLayer::new(1, 4, network.rng());
//! network.add_layer(lstm);
//! // The input count is wired to the LSTM's output count automatically.
//! let dense = FeedForwardLayer::new(0, 1, network.rng());
//! network.add_layer(dense);
//! assert_eq!(network.input_len(), 1);
//! assert_eq!(network.output_len(), 1);
//!
//! let sequence = [0.5, -0.5, 0.25, 0.0, -0.25];
//! let mut loss = 0.0;
//! for _ in 0..50 {
//!     network.reset_state();
//!     loss = 0.0;
//!     for pair in sequence.windows(2) {
//!         let input = Vector::from(vec![pair[1]]);
//!         let expected = Vector::from(vec![pair[0]]);
//!         loss += network.train(&input, &expected, 0.05).unwrap();
//!     }
//! }
//! assert!(loss.is_finite());
//!
//! // Models persist as a JSON array of layer records.
//! let json = network.to_json().unwrap();
//! let mut restored = NeuralNetwork::with_seed(0);
//! restored.load_json(&json).unwrap();
//! assert_eq!(restored.len(), 2);
//! ```

use crate::error::{check_len, Error, Result};
use crate::layers::{AnyLayer, Layer, LayerRecord};
use crate::vector::Vector;

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::{Read, Write};

/// An ordered stack of layers, each feeding the next.
///
/// The network owns its layers and the random source used to initialize
/// them when they are re-wired.
#[derive(Debug)]
pub struct NeuralNetwork {
    layers: Vec<AnyLayer>,
    rng: StdRng,
}

impl Default for NeuralNetwork {
    fn default() -> Self {
        NeuralNetwork::new()
    }
}

impl NeuralNetwork {
    /// Creates an empty network seeded from system entropy.
    pub fn new() -> Self {
        NeuralNetwork::with_rng(StdRng::from_entropy())
    }

    /// Creates an empty network whose random initialization is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        NeuralNetwork::with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(rng: StdRng) -> Self {
        NeuralNetwork {
            layers: Vec::new(),
            rng,
        }
    }

    /// The random source used for layer initialization.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Returns the size of the input layer to the network, or 0 when the
    /// network is empty.
    pub fn input_len(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.input_len())
    }

    /// Returns the size of the output layer from the network, or 0 when the
    /// network is empty.
    pub fn output_len(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.output_len())
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[AnyLayer] {
        &self.layers
    }

    /// Appends `layer` to the network.
    ///
    /// If the network already has layers, the input count of `layer` is set
    /// to the output count of the current last layer, which redraws its
    /// parameters.
    pub fn add_layer<L: Into<AnyLayer>>(&mut self, layer: L) {
        let mut layer = layer.into();
        if let Some(last) = self.layers.last() {
            let inputs = last.output_len();
            debug!(
                "wiring {} layer {} to previous output of {}",
                layer.type_name(),
                self.layers.len(),
                inputs
            );
            layer.set_input_len(inputs, &mut self.rng);
        }
        self.layers.push(layer);
    }

    /// Feeds the provided `input` through the network, returning the output
    /// of the last layer.
    pub fn propagate(&mut self, input: &Vector) -> Result<Vector> {
        self.check_input(input)?;
        let mut data = input.clone();
        for layer in &mut self.layers {
            data = layer.propagate(&data)?;
        }
        Ok(data)
    }

    /// Runs one step of gradient descent on a single example.
    ///
    /// Returns the half squared error of the network's output *before* the
    /// update.
    pub fn train(&mut self, input: &Vector, expected: &Vector, mutability: f64) -> Result<f64> {
        self.check_input(input)?;
        check_len(self.output_len(), expected.len())?;

        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input.clone());
        for (i, layer) in self.layers.iter_mut().enumerate() {
            let output = layer.propagate(&activations[i])?;
            activations.push(output);
        }

        let actual = &activations[self.layers.len()];
        let loss = half_square_error(actual, expected);
        let mut delta = actual.try_sub(expected)?;
        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            delta = layer.train(&activations[i], &activations[i + 1], &delta, mutability)?;
        }
        Ok(loss)
    }

    /// Propagates `input` and returns the half squared error against
    /// `expected`, without training.
    ///
    /// Like [`NeuralNetwork::propagate`], this advances recurrent state.
    pub fn loss(&mut self, input: &Vector, expected: &Vector) -> Result<f64> {
        self.check_input(input)?;
        check_len(self.output_len(), expected.len())?;
        let actual = self.propagate(input)?;
        Ok(half_square_error(&actual, expected))
    }

    /// Clears the recurrent state of every layer, e.g. before an
    /// independent sequence.
    pub fn reset_state(&mut self) {
        for layer in &mut self.layers {
            layer.reset_state();
        }
    }

    /// Returns the persisted form of every layer, in order.
    pub fn save(&self) -> Result<Vec<LayerRecord>> {
        self.layers.iter().map(|layer| layer.save()).collect()
    }

    /// Replaces every layer with those described by `records`.
    ///
    /// Loaded layers are not re-wired, since that would discard their
    /// parameters. Instead adjacent records must already agree on their
    /// shared size. On error the network is left untouched.
    pub fn load(&mut self, records: Vec<LayerRecord>) -> Result<()> {
        let mut layers: Vec<AnyLayer> = Vec::with_capacity(records.len());
        for record in records {
            let layer = AnyLayer::from_record(record)?;
            if let Some(last) = layers.last() {
                check_len(last.output_len(), layer.input_len())?;
            }
            layers.push(layer);
        }
        self.layers = layers;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.save()?)?)
    }

    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let records: Vec<LayerRecord> = serde_json::from_str(json)?;
        self.load(records)
    }

    pub fn save_to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, &self.save()?)?;
        Ok(())
    }

    pub fn load_from_reader<R: Read>(&mut self, reader: R) -> Result<()> {
        let records: Vec<LayerRecord> = serde_json::from_reader(reader)?;
        self.load(records)
    }

    fn check_input(&self, input: &Vector) -> Result<()> {
        match self.layers.first() {
            Some(first) => check_len(first.input_len(), input.len()),
            None => Err(Error::EmptyNetwork),
        }
    }
}

/// Computes `0.5 * Σ (expected - actual)²`.
fn half_square_error(actual: &Vector, expected: &Vector) -> f64 {
    let mut error = 0.0;
    for (&a, &e) in actual.iter().zip(expected.iter()) {
        error += 0.5 * (e - a) * (e - a);
    }
    error
}
