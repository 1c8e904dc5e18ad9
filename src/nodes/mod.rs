//! Processing stages built on the runtime framework

pub mod decoders;
pub mod encoders;

pub use decoders::{BatchDecoder, DecodeOpts, PolarDecoder, PolarMkScDecoder, WaveDecoder};
pub use encoders::{PolarEncoder, PolarMkEncoder};

use crate::runtime::WorkError;

/// Buffer shape failures at encode/decode entry points.
///
/// These are fatal at the call site: a stage never guesses the caller's
/// intent from a buffer that matches no expected shape.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("input buffer length {got} is invalid (expected {expected})")]
    InputLength { expected: usize, got: usize },

    #[error("output buffer length {got} is invalid (expected {expected})")]
    OutputLength { expected: usize, got: usize },

    #[error("output buffer length {got} is invalid (expected at most {max})")]
    OutputTooLong { max: usize, got: usize },

    #[error(
        "output buffer length {got} matches neither the information length \
         ({info_len}) nor the codeword length ({codeword_len})"
    )]
    OutputShape {
        got: usize,
        info_len: usize,
        codeword_len: usize,
    },
}

impl From<ShapeError> for WorkError {
    fn from(e: ShapeError) -> Self {
        WorkError::Node(e.to_string())
    }
}
