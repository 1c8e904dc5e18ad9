//! Module: a named owner of tasks
//!
//! A module groups the callable operations of one processing stage (a
//! source, an encoder, a decoder, ...). It owns its tasks and the frame
//! count they share; it owns no buffers itself.

use tracing::debug;

use super::errors::PortError;
use super::task::Task;

/// A named processing stage owning one or more tasks
#[derive(Debug)]
pub struct Module {
    name: String,
    n_frames: usize,
    tasks: Vec<Task>,
}

impl Module {
    /// Create a module processing `n_frames` logical frames per task call
    ///
    /// # Panics
    ///
    /// Panics if `n_frames` is zero.
    pub fn new(name: impl Into<String>, n_frames: usize) -> Self {
        assert!(n_frames >= 1, "a module needs at least one frame per call");
        Self {
            name: name.into(),
            n_frames,
            tasks: Vec::new(),
        }
    }

    /// Module name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of logical frames processed per task call
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Register a new task and hand it back for socket/codelet setup
    pub fn add_task(&mut self, name: impl Into<String>) -> Result<&mut Task, PortError> {
        let name = name.into();
        if self.tasks.iter().any(|t| t.name() == name) {
            return Err(PortError::DuplicateTask {
                name,
                module: self.name.clone(),
            });
        }
        debug!(module = self.name.as_str(), task = name.as_str(), "task registered");
        self.tasks
            .push(Task::new(self.name.clone(), name, self.n_frames));
        Ok(self.tasks.last_mut().expect("just pushed"))
    }

    /// Look up a task by name
    pub fn task(&self, name: &str) -> Result<&Task, PortError> {
        self.tasks
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| PortError::UnknownTask {
                name: name.to_string(),
                module: self.name.clone(),
            })
    }

    /// Mutable variant of [`Module::task`]
    pub fn task_mut(&mut self, name: &str) -> Result<&mut Task, PortError> {
        match self.tasks.iter_mut().find(|t| t.name() == name) {
            Some(t) => Ok(t),
            None => Err(PortError::UnknownTask {
                name: name.to_string(),
                module: self.name.clone(),
            }),
        }
    }

    /// Iterate tasks in registration order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup_task() {
        let mut m = Module::new("decoder", 1);
        m.add_task("decode").unwrap();
        assert!(m.task("decode").is_ok());
        assert!(matches!(
            m.task("missing"),
            Err(PortError::UnknownTask { .. })
        ));
    }

    #[test]
    fn test_duplicate_task_name_rejected() {
        let mut m = Module::new("decoder", 1);
        m.add_task("decode").unwrap();
        assert!(matches!(
            m.add_task("decode"),
            Err(PortError::DuplicateTask { .. })
        ));
    }

    #[test]
    fn test_tasks_inherit_frame_count() {
        let mut m = Module::new("decoder", 4);
        let t = m.add_task("decode").unwrap();
        assert_eq!(t.n_frames(), 4);
    }
}
