//! Runtime support for stage composition
//!
//! Every processing stage is built from the same three pieces: a [`Module`]
//! naming the stage, one or more [`Task`]s exposing its operations, and
//! buffer-backed [`Socket`]s declaring each operation's data ports. The
//! runtime handles allocation policy, readiness gating, duration statistics
//! and debug traces so individual stages don't have to.

pub mod errors;
pub mod module;
pub mod socket;
pub mod stats;
pub mod task;

pub use errors::{PortError, WorkError, WorkResult};
pub use module::Module;
pub use socket::{
    BufferHandle, Element, ElementKind, Socket, SocketBuffer, SocketDirection, SocketSet,
};
pub use stats::{DurationStats, PhaseTimers};
pub use task::{Codelet, Task};
