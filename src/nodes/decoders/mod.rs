//! Decoder stages
//!
//! A concrete decoder only knows how to process one SIMD wave of frames at
//! a time; it exposes that capability through the [`WaveDecoder`] hooks.
//! The [`BatchDecoder`] driver turns those hooks into a contract accepting
//! any number of logical frames per call, with staging, partial-wave
//! handling and phase timing.

pub mod batch;
pub mod polar_mk_sc;

pub use batch::{BatchDecoder, DecodeOpts};
pub use polar_mk_sc::{PolarDecoder, PolarMkScDecoder};

use crate::{Bit, Llr};

/// Hooks of a single-wave decode primitive.
///
/// `load`, `decode_wave` and the store hooks always see exactly
/// `simd_inter_frame_level` frames worth of data; the batch driver pads the
/// last wave when the frame count is not a multiple of the SIMD width and
/// discards the padding on the way out.
pub trait WaveDecoder {
    /// Number of information bits per frame
    fn k(&self) -> usize;

    /// Codeword length per frame
    fn n(&self) -> usize;

    /// Number of frames absorbed per wave
    fn simd_inter_frame_level(&self) -> usize;

    /// Copy one wave of channel LLRs into the decoder
    fn load(&mut self, y_n: &[Llr]);

    /// Decode the loaded wave
    fn decode_wave(&mut self);

    /// Write the wave's information bits (`simd * K` elements)
    fn store(&mut self, v_k: &mut [Bit]);

    /// Write the wave's full re-encoded codewords (`simd * N` elements)
    fn store_cw(&mut self, v_n: &mut [Bit]);

    /// Alternative store in a possibly non-canonical format; the default
    /// falls through to the canonical information store
    fn store_fast(&mut self, v: &mut [Bit]) {
        self.store(v);
    }

    /// Convert a fast-stored buffer to the canonical bit format; identity
    /// unless a concrete decoder stores in a packed layout
    fn unpack(&self, _v: &mut [Bit]) {}
}
