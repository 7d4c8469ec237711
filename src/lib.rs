//! Feed-forward and LSTM layers composed into networks, trained by plain
//! gradient descent and persisted as JSON.
//!
//! Build a [`NeuralNetwork`] by appending layers; each new layer is wired
//! to the output of the one before it. [`NeuralNetwork::train`] runs one
//! step of backpropagation on a single example, and [`trainer::Trainer`]
//! repeats that over whole sequences.

pub mod activator;
pub mod backend;
pub mod error;
pub mod layers;
pub mod matrix;
pub mod network;
pub mod trainer;
pub mod vector;

mod utils;

pub use crate::error::{Error, Result};
pub use crate::layers::{AnyLayer, FeedForwardLayer, Layer, LayerRecord, LstmLayer};
pub use crate::matrix::Mat;
pub use crate::network::NeuralNetwork;
pub use crate::vector::Vector;
