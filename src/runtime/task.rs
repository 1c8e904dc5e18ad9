//! Task: a named operation with declared data ports
//!
//! A task owns an ordered set of sockets, a codelet (the computation body,
//! bound once), duration statistics and debug switches. Executing a task is
//! gated: every socket must have a buffer and a codelet must be bound,
//! otherwise [`exec`](Task::exec) refuses to run.
//!
//! The codelet receives the task's sockets plus its sub-phase timers, so a
//! stage can report internal load/decode/store timings without the task
//! having to know about them.

use std::time::Instant;

use tracing::debug;

use super::errors::{PortError, WorkError, WorkResult};
use super::socket::{Element, Socket, SocketDirection, SocketSet};
use super::stats::{DurationStats, PhaseTimers};

/// Computation body of a task.
///
/// Returns the number of items produced (frames, symbols, ... whatever the
/// stage counts), or a [`WorkError`] on failure.
pub type Codelet = Box<dyn FnMut(&mut SocketSet, &mut PhaseTimers) -> WorkResult<usize>>;

#[derive(Debug, Clone, Copy)]
struct DebugOpts {
    enabled: bool,
    limit: Option<usize>,
    precision: usize,
}

impl Default for DebugOpts {
    fn default() -> Self {
        Self {
            enabled: false,
            limit: None,
            precision: 2,
        }
    }
}

/// A named operation belonging to a [`Module`](super::module::Module)
pub struct Task {
    module: String,
    name: String,
    n_frames: usize,
    sockets: SocketSet,
    codelet: Option<Codelet>,
    autoalloc: bool,
    stats_enabled: bool,
    n_calls: u64,
    stats: DurationStats,
    phases: PhaseTimers,
    debug: DebugOpts,
}

impl Task {
    pub(crate) fn new(module: String, name: String, n_frames: usize) -> Self {
        let sockets = SocketSet::new(module.clone(), name.clone());
        Self {
            module,
            name,
            n_frames,
            sockets,
            codelet: None,
            autoalloc: true,
            stats_enabled: true,
            n_calls: 0,
            stats: DurationStats::default(),
            phases: PhaseTimers::new(),
            debug: DebugOpts::default(),
        }
    }

    /// Task name, unique within its module
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of logical frames per call (used for debug frame splitting)
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    fn create_socket<T: Element>(
        &mut self,
        name: &str,
        n_elmts: usize,
        direction: SocketDirection,
    ) -> Result<(), PortError> {
        if name.is_empty() {
            return Err(PortError::EmptyName {
                task: self.name.clone(),
                module: self.module.clone(),
            });
        }
        if self.sockets.contains(name) {
            return Err(PortError::DuplicateName {
                name: name.to_string(),
                task: self.name.clone(),
                module: self.module.clone(),
            });
        }
        let mut socket = Socket::new(name.to_string(), T::KIND, n_elmts, direction);
        if direction == SocketDirection::Output && self.autoalloc {
            socket.alloc();
        }
        self.sockets.push(socket);
        Ok(())
    }

    /// Declare an input socket of `n_elmts` elements of type `T`
    pub fn create_input_socket<T: Element>(
        &mut self,
        name: &str,
        n_elmts: usize,
    ) -> Result<(), PortError> {
        self.create_socket::<T>(name, n_elmts, SocketDirection::Input)
    }

    /// Declare an output socket; an owned buffer is allocated immediately
    /// when the allocation policy is "owned"
    pub fn create_output_socket<T: Element>(
        &mut self,
        name: &str,
        n_elmts: usize,
    ) -> Result<(), PortError> {
        self.create_socket::<T>(name, n_elmts, SocketDirection::Output)
    }

    /// Declare an input-output socket
    pub fn create_inout_socket<T: Element>(
        &mut self,
        name: &str,
        n_elmts: usize,
    ) -> Result<(), PortError> {
        self.create_socket::<T>(name, n_elmts, SocketDirection::InputOutput)
    }

    /// Register the task's computation body. Executing before this is
    /// called fails with [`WorkError::Unimplemented`].
    pub fn bind_codelet(&mut self, codelet: Codelet) {
        self.codelet = Some(codelet);
    }

    /// Current allocation policy ("owned" = true)
    pub fn is_autoalloc(&self) -> bool {
        self.autoalloc
    }

    /// Switch the allocation policy.
    ///
    /// Switching to "external" drops the owned buffers of output sockets,
    /// making the task non-executable until a caller binds them; switching
    /// back to "owned" allocates fresh zeroed buffers for every output
    /// socket.
    pub fn set_autoalloc(&mut self, autoalloc: bool) {
        if autoalloc == self.autoalloc {
            return;
        }
        self.autoalloc = autoalloc;
        for s in self.sockets.iter_mut() {
            if s.direction() == SocketDirection::Output {
                if autoalloc {
                    s.alloc();
                } else {
                    s.unbind();
                }
            }
        }
    }

    /// Enable or disable duration statistics
    pub fn set_stats(&mut self, stats: bool) {
        self.stats_enabled = stats;
    }

    /// True when duration statistics are recorded
    pub fn is_stats(&self) -> bool {
        self.stats_enabled
    }

    /// Enable or disable the debug traces of socket contents
    pub fn set_debug(&mut self, debug: bool) {
        self.debug.enabled = debug;
    }

    /// Cap the number of elements traced per logical frame
    pub fn set_debug_limit(&mut self, limit: usize) {
        self.debug.limit = Some(limit);
    }

    /// Numeric precision of traced floating-point elements
    pub fn set_debug_precision(&mut self, precision: usize) {
        self.debug.precision = precision;
    }

    /// True when debug traces are enabled
    pub fn is_debug(&self) -> bool {
        self.debug.enabled
    }

    /// The task's sockets
    pub fn sockets(&self) -> &SocketSet {
        &self.sockets
    }

    /// Mutable access to the sockets, for binding
    pub fn sockets_mut(&mut self) -> &mut SocketSet {
        &mut self.sockets
    }

    /// Shorthand: look up a socket by name
    pub fn socket(&self, name: &str) -> Result<&Socket, PortError> {
        self.sockets.get(name)
    }

    /// Shorthand: mutable socket lookup
    pub fn socket_mut(&mut self, name: &str) -> Result<&mut Socket, PortError> {
        self.sockets.get_mut(name)
    }

    /// Pre-declare a named sub-phase timer
    pub fn register_phase(&mut self, key: impl Into<String>) {
        self.phases.register(key);
    }

    /// The task's sub-phase timers
    pub fn phases(&self) -> &PhaseTimers {
        &self.phases
    }

    /// Number of successful codelet invocations
    pub fn n_calls(&self) -> u64 {
        self.n_calls
    }

    /// Duration statistics of the codelet invocations
    pub fn stats(&self) -> &DurationStats {
        &self.stats
    }

    /// Zero the call counter, the duration statistics and every sub-phase
    /// timer
    pub fn reset_stats(&mut self) {
        self.n_calls = 0;
        self.stats.reset();
        self.phases.reset();
    }

    /// Execute the codelet once.
    ///
    /// Fails with [`WorkError::Unimplemented`] when no codelet is bound and
    /// with [`WorkError::NotReady`] when any socket has no buffer. On
    /// success the call counter is incremented and, if statistics are
    /// enabled, the duration accumulators are updated (the first call seeds
    /// min and max).
    pub fn exec(&mut self) -> WorkResult<usize> {
        if self.codelet.is_none() {
            return Err(WorkError::Unimplemented {
                task: self.name.clone(),
                module: self.module.clone(),
            });
        }
        if let Some(s) = self.sockets.iter().find(|s| !s.is_bound()) {
            return Err(WorkError::NotReady {
                task: self.name.clone(),
                module: self.module.clone(),
                socket: s.name().to_string(),
            });
        }

        if self.debug.enabled {
            self.trace_sockets(true);
        }

        let codelet = self.codelet.as_mut().expect("checked above");
        let status = if self.stats_enabled {
            let t_start = Instant::now();
            let status = codelet(&mut self.sockets, &mut self.phases)?;
            self.stats.record(t_start.elapsed());
            status
        } else {
            codelet(&mut self.sockets, &mut self.phases)?
        };
        self.n_calls += 1;

        if self.debug.enabled {
            self.trace_sockets(false);
            debug!(
                module = self.module.as_str(),
                task = self.name.as_str(),
                status,
                "codelet returned"
            );
        }

        Ok(status)
    }

    /// Trace the contents of input (before) or output (after) sockets, up
    /// to the configured element limit per logical frame
    fn trace_sockets(&self, inputs: bool) {
        for s in self.sockets.iter() {
            let wanted = match s.direction() {
                SocketDirection::Input => inputs,
                SocketDirection::Output => !inputs,
                SocketDirection::InputOutput => true,
            };
            if !wanted {
                continue;
            }
            let Some(handle) = s.handle() else { continue };
            let buf = handle.borrow();

            let n_frames = self.n_frames.max(1);
            let fra_size = s.n_elmts() / n_frames;
            let limit = self.debug.limit.map_or(fra_size, |l| l.min(fra_size));
            let tag = if inputs { "{IN}" } else { "{OUT}" };

            for f in 0..n_frames {
                let start = f * fra_size;
                let body = buf.preview(start..start + limit, self.debug.precision);
                let ellipsis = if limit < fra_size { ", ..." } else { "" };
                debug!(
                    module = self.module.as_str(),
                    task = self.name.as_str(),
                    socket = s.name(),
                    frame = f + 1,
                    "{tag} [{body}{ellipsis}]"
                );
            }
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("n_frames", &self.n_frames)
            .field("n_sockets", &self.sockets.len())
            .field("has_codelet", &self.codelet.is_some())
            .field("autoalloc", &self.autoalloc)
            .field("n_calls", &self.n_calls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::socket::SocketBuffer;

    fn task() -> Task {
        Task::new("mod".to_string(), "op".to_string(), 1)
    }

    #[test]
    fn test_duplicate_socket_name_rejected() {
        let mut t = task();
        t.create_input_socket::<f32>("X", 4).unwrap();
        let err = t.create_output_socket::<f32>("X", 4);
        assert!(matches!(err, Err(PortError::DuplicateName { .. })));
    }

    #[test]
    fn test_empty_socket_name_rejected() {
        let mut t = task();
        assert!(matches!(
            t.create_input_socket::<f32>("", 4),
            Err(PortError::EmptyName { .. })
        ));
    }

    #[test]
    fn test_exec_before_codelet_fails() {
        let mut t = task();
        assert!(matches!(
            t.exec(),
            Err(WorkError::Unimplemented { .. })
        ));
    }

    #[test]
    fn test_exec_with_unbound_socket_fails() {
        let mut t = task();
        t.create_input_socket::<f32>("X", 4).unwrap();
        t.bind_codelet(Box::new(|_io, _phases| Ok(0)));
        match t.exec() {
            Err(WorkError::NotReady { socket, .. }) => assert_eq!(socket, "X"),
            other => panic!("expected NotReady, got {other:?}"),
        }
    }

    #[test]
    fn test_exec_counts_calls_and_runs_codelet() {
        let mut t = task();
        t.create_input_socket::<f32>("X", 4).unwrap();
        t.create_output_socket::<f32>("Y", 4).unwrap();
        t.socket_mut("X")
            .unwrap()
            .attach(SocketBuffer::F32(vec![1.0, -2.0, 3.0, -4.0]).into_handle())
            .unwrap();
        t.bind_codelet(Box::new(|io, _phases| {
            let x: Vec<f32> = io.read::<f32>("X")?.to_vec();
            let mut y = io.write::<f32>("Y")?;
            for (yi, xi) in y.iter_mut().zip(&x) {
                *yi = xi.abs();
            }
            Ok(1)
        }));

        assert_eq!(t.n_calls(), 0);
        assert_eq!(t.exec().unwrap(), 1);
        assert_eq!(t.exec().unwrap(), 1);
        assert_eq!(t.n_calls(), 2);
        assert_eq!(t.stats().n_calls(), 2);
        assert_eq!(&*t.socket("Y").unwrap().data::<f32>().unwrap(), &[
            1.0, 2.0, 3.0, 4.0
        ]);
    }

    #[test]
    fn test_codelet_error_does_not_count() {
        let mut t = task();
        t.bind_codelet(Box::new(|_io, _phases| {
            Err(WorkError::Node("boom".to_string()))
        }));
        assert!(t.exec().is_err());
        assert_eq!(t.n_calls(), 0);
    }

    #[test]
    fn test_autoalloc_toggle_releases_and_reallocates_outputs() {
        let mut t = task();
        t.create_output_socket::<u8>("V", 8).unwrap();
        assert!(t.socket("V").unwrap().is_bound());

        t.set_autoalloc(false);
        assert!(!t.socket("V").unwrap().is_bound());

        t.set_autoalloc(true);
        assert!(t.socket("V").unwrap().is_bound());
    }

    #[test]
    fn test_output_not_allocated_under_external_policy() {
        let mut t = task();
        t.set_autoalloc(false);
        t.create_output_socket::<u8>("V", 8).unwrap();
        assert!(!t.socket("V").unwrap().is_bound());
    }

    #[test]
    fn test_codelet_feeds_phase_timers() {
        let mut t = task();
        t.register_phase("load");
        t.bind_codelet(Box::new(|_io, phases| {
            phases.update("load", std::time::Duration::from_micros(5));
            Ok(0)
        }));
        t.exec().unwrap();
        t.exec().unwrap();
        assert_eq!(t.phases().get("load").unwrap().n_calls(), 2);

        t.reset_stats();
        assert_eq!(t.n_calls(), 0);
        assert_eq!(t.phases().get("load").unwrap().n_calls(), 0);
    }

    #[test]
    fn test_inout_socket_updates_in_place() {
        let mut t = task();
        t.create_inout_socket::<i32>("B", 4).unwrap();
        t.socket_mut("B")
            .unwrap()
            .attach(SocketBuffer::I32(vec![1, 2, 3, 4]).into_handle())
            .unwrap();
        t.bind_codelet(Box::new(|io, _phases| {
            for x in io.write::<i32>("B")?.iter_mut() {
                *x *= 2;
            }
            Ok(1)
        }));
        t.exec().unwrap();
        assert_eq!(&*t.socket("B").unwrap().data::<i32>().unwrap(), &[2, 4, 6, 8]);
    }

    #[test]
    fn test_stats_disabled_still_counts_calls() {
        let mut t = task();
        t.set_stats(false);
        t.bind_codelet(Box::new(|_io, _phases| Ok(0)));
        t.exec().unwrap();
        assert_eq!(t.n_calls(), 1);
        assert_eq!(t.stats().n_calls(), 0);
    }
}
