//! Encoder stages

pub mod polar_mk;

pub use polar_mk::{PolarEncoder, PolarMkEncoder};
