//! Error types shared by containers, layers and networks.

use std::io;

use thiserror::Error;

/// Everything that can go wrong while running, training or persisting a
/// network.
#[derive(Debug, Error)]
pub enum Error {
    /// An operand did not have the size the operation requires.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// The network has no layers to run.
    #[error("network has no layers")]
    EmptyNetwork,
    /// A persisted layer carried a type tag no layer answers to.
    #[error("unknown layer type `{0}`")]
    UnknownLayerType(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Returns `Ok(())` when `actual == expected`, and a `DimensionMismatch`
/// otherwise.
pub fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::DimensionMismatch { expected, actual })
    }
}
