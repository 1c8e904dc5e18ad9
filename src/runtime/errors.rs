//! Error types for the runtime system

use super::socket::ElementKind;

/// Error type for socket creation, lookup and binding
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("socket name is empty ('task' = {task}, 'module' = {module})")]
    EmptyName { task: String, module: String },

    #[error("a socket named '{name}' already exists ('task' = {task}, 'module' = {module})")]
    DuplicateName {
        name: String,
        task: String,
        module: String,
    },

    #[error("the socket '{name}' does not exist ('task' = {task}, 'module' = {module})")]
    UnknownSocket {
        name: String,
        task: String,
        module: String,
    },

    #[error("a task named '{name}' already exists ('module' = {module})")]
    DuplicateTask { name: String, module: String },

    #[error("the task '{name}' does not exist ('module' = {module})")]
    UnknownTask { name: String, module: String },

    #[error("socket '{name}' has no buffer bound")]
    Unbound { name: String },

    #[error("socket '{name}' element kind mismatch: {expected:?} != {got:?}")]
    KindMismatch {
        name: String,
        expected: ElementKind,
        got: ElementKind,
    },

    #[error("socket '{name}' element count mismatch: {expected} != {got}")]
    SizeMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
}

/// Error type for task execution
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    #[error("no codelet is bound to the task ('task' = {task}, 'module' = {module})")]
    Unimplemented { task: String, module: String },

    #[error(
        "the task cannot be executed because socket '{socket}' is not fed \
         ('task' = {task}, 'module' = {module})"
    )]
    NotReady {
        task: String,
        module: String,
        socket: String,
    },

    #[error(transparent)]
    Port(#[from] PortError),

    #[error("node-specific error: {0}")]
    Node(String),
}

/// Result type for codelets and task execution
pub type WorkResult<T = ()> = Result<T, WorkError>;
