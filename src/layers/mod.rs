//! The layers a network is assembled from.
//!
//! Every layer implements [`Layer`]. A network stores its layers as
//! [`AnyLayer`], the closed set of layer kinds that can be persisted and
//! loaded back.

mod dense;
mod lstm;

pub use self::dense::FeedForwardLayer;
pub use self::lstm::LstmLayer;

use crate::error::{Error, Result};
use crate::vector::Vector;

use rand::Rng;
use serde_derive::{Deserialize, Serialize};

/// The learning rate used when the caller has no opinion.
pub const DEFAULT_MUTABILITY: f64 = 0.05;

/// A single layer of a neural network.
pub trait Layer {
    /// Returns the number of inputs to this layer.
    fn input_len(&self) -> usize;

    /// Returns the number of outputs from this layer.
    fn output_len(&self) -> usize;

    /// Reshapes the layer and draws fresh random parameters for the new
    /// shape. Old parameters are discarded.
    fn resize<R: Rng + ?Sized>(&mut self, inputs: usize, outputs: usize, rng: &mut R);

    fn set_input_len<R: Rng + ?Sized>(&mut self, inputs: usize, rng: &mut R) {
        let outputs = self.output_len();
        self.resize(inputs, outputs, rng);
    }

    fn set_output_len<R: Rng + ?Sized>(&mut self, outputs: usize, rng: &mut R) {
        let inputs = self.input_len();
        self.resize(inputs, outputs, rng);
    }

    /// Feeds `input` forward through the layer.
    ///
    /// Recurrent layers advance their internal state.
    fn propagate(&mut self, input: &Vector) -> Result<Vector>;

    /// Applies one step of gradient descent.
    ///
    /// Arguments:
    ///  * `input` - the input given to the matching `propagate` call.
    ///  * `output` - the output that call produced.
    ///  * `delta` - the error with respect to `output`.
    ///  * `mutability` - the gradient descent rate.
    ///
    /// Returns the error with respect to `input`, for the previous layer.
    fn train(
        &mut self,
        input: &Vector,
        output: &Vector,
        delta: &Vector,
        mutability: f64,
    ) -> Result<Vector>;

    /// Forgets any recurrent state.
    fn reset_state(&mut self) {}

    /// The tag written to the `type` field of a persisted layer.
    fn type_name(&self) -> &'static str;

    /// Returns every parameter of the layer as a JSON object.
    fn save_data(&self) -> Result<serde_json::Value>;

    /// Replaces the shape and parameters of the layer with those in `data`.
    fn load_data(&mut self, inputs: usize, outputs: usize, data: serde_json::Value) -> Result<()>;

    fn save(&self) -> Result<LayerRecord> {
        Ok(LayerRecord {
            inputs: self.input_len(),
            outputs: self.output_len(),
            kind: self.type_name().to_string(),
            data: self.save_data()?,
        })
    }
}

/// A persisted layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    pub inputs: usize,
    pub outputs: usize,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

/// Any of the layer kinds this crate knows how to persist.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyLayer {
    FeedForward(FeedForwardLayer),
    Lstm(LstmLayer),
}

impl AnyLayer {
    /// Rebuilds a layer from its persisted form.
    pub fn from_record(record: LayerRecord) -> Result<Self> {
        let mut layer = match record.kind.as_str() {
            // Older model files spell the tag without the hyphen.
            dense::TYPE_NAME | "feedforward" => AnyLayer::FeedForward(FeedForwardLayer::default()),
            lstm::TYPE_NAME => AnyLayer::Lstm(LstmLayer::default()),
            _ => return Err(Error::UnknownLayerType(record.kind)),
        };
        layer.load_data(record.inputs, record.outputs, record.data)?;
        Ok(layer)
    }
}

impl From<FeedForwardLayer> for AnyLayer {
    fn from(layer: FeedForwardLayer) -> Self {
        AnyLayer::FeedForward(layer)
    }
}

impl From<LstmLayer> for AnyLayer {
    fn from(layer: LstmLayer) -> Self {
        AnyLayer::Lstm(layer)
    }
}

impl Layer for AnyLayer {
    fn input_len(&self) -> usize {
        match self {
            AnyLayer::FeedForward(layer) => layer.input_len(),
            AnyLayer::Lstm(layer) => layer.input_len(),
        }
    }

    fn output_len(&self) -> usize {
        match self {
            AnyLayer::FeedForward(layer) => layer.output_len(),
            AnyLayer::Lstm(layer) => layer.output_len(),
        }
    }

    fn resize<R: Rng + ?Sized>(&mut self, inputs: usize, outputs: usize, rng: &mut R) {
        match self {
            AnyLayer::FeedForward(layer) => layer.resize(inputs, outputs, rng),
            AnyLayer::Lstm(layer) => layer.resize(inputs, outputs, rng),
        }
    }

    fn propagate(&mut self, input: &Vector) -> Result<Vector> {
        match self {
            AnyLayer::FeedForward(layer) => layer.propagate(input),
            AnyLayer::Lstm(layer) => layer.propagate(input),
        }
    }

    fn train(
        &mut self,
        input: &Vector,
        output: &Vector,
        delta: &Vector,
        mutability: f64,
    ) -> Result<Vector> {
        match self {
            AnyLayer::FeedForward(layer) => layer.train(input, output, delta, mutability),
            AnyLayer::Lstm(layer) => layer.train(input, output, delta, mutability),
        }
    }

    fn reset_state(&mut self) {
        match self {
            AnyLayer::FeedForward(layer) => layer.reset_state(),
            AnyLayer::Lstm(layer) => layer.reset_state(),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            AnyLayer::FeedForward(layer) => layer.type_name(),
            AnyLayer::Lstm(layer) => layer.type_name(),
        }
    }

    fn save_data(&self) -> Result<serde_json::Value> {
        match self {
            AnyLayer::FeedForward(layer) => layer.save_data(),
            AnyLayer::Lstm(layer) => layer.save_data(),
        }
    }

    fn load_data(&mut self, inputs: usize, outputs: usize, data: serde_json::Value) -> Result<()> {
        match self {
            AnyLayer::FeedForward(layer) => layer.load_data(inputs, outputs, data),
            AnyLayer::Lstm(layer) => layer.load_data(inputs, outputs, data),
        }
    }
}
