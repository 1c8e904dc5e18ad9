//! Forward-error-correction coding-chain toolbox
//!
//! This library provides the two pieces every FEC simulation chain is built
//! from: a composition framework for processing stages, and the codec
//! stages themselves, here a generalized multi-kernel polar code pair
//! (encoder + successive-cancellation decoder).
//!
//! # Architecture
//!
//! - **Runtime**: [`Module`] / [`Task`] / [`Socket`]: named stages with
//!   typed, buffer-backed ports, execution gating, timing statistics and
//!   debug traces
//! - **Tree**: arena-backed recursive kernel factorization used by the SC
//!   decoder
//! - **Codecs**: [`PolarMkEncoder`] / [`PolarMkScDecoder`] cores, the
//!   [`BatchDecoder`] frame-batch driver, and [`PolarEncoder`] /
//!   [`PolarDecoder`] module wrappers
//!
//! # Example
//!
//! ```
//! use fecsim::{BatchDecoder, PolarCode, PolarMkEncoder, PolarMkScDecoder};
//! use fecsim::code::kernel_arikan;
//!
//! let code = PolarCode::mono(kernel_arikan(), 3)?;
//! let frozen = vec![true, true, true, false, true, false, false, false];
//!
//! let enc = PolarMkEncoder::new(4, 8, &code, &frozen)?;
//! let mut x_n = vec![0; 8];
//! enc.encode(&[1, 0, 1, 1], &mut x_n)?;
//!
//! // noiseless channel: large correctly-signed LLRs
//! let y_n: Vec<f32> = x_n.iter().map(|&b| if b == 0 { 10.0 } else { -10.0 }).collect();
//!
//! let mut dec = BatchDecoder::new(1, PolarMkScDecoder::new(4, 8, &code, &frozen, 1)?)?;
//! let mut v_k = vec![0; 4];
//! dec.decode(&y_n, &mut v_k)?;
//! assert_eq!(v_k, vec![1, 0, 1, 1]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod code;
pub mod nodes;
pub mod runtime;
pub mod tree;

/// Soft bit estimate: a signed log-likelihood ratio (positive leans 0,
/// negative leans 1)
pub type Llr = f32;

/// Hard bit value, 0 or 1
pub type Bit = u8;

pub use code::{ConstructionError, KernelMatrix, PolarCode};
pub use nodes::decoders::{
    BatchDecoder, DecodeOpts, PolarDecoder, PolarMkScDecoder, WaveDecoder,
};
pub use nodes::encoders::{PolarEncoder, PolarMkEncoder};
pub use nodes::ShapeError;
pub use runtime::{
    BufferHandle, DurationStats, Element, ElementKind, Module, PhaseTimers, PortError, Socket,
    SocketBuffer, SocketDirection, SocketSet, Task, WorkError, WorkResult,
};
pub use tree::{NodeId, Tree};
