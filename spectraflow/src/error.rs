use thiserror::Error;

/// Crate-wide result type.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Every failure the engine can produce.  All variants are deterministic
/// consequences of invalid use or malformed data; none are transient, so
/// nothing is ever retried.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("node {node}: parameter {name} is missing or empty")]
    MissingParameter { node: String, name: String },

    #[error("node {node}: input {name} has not been supplied")]
    MissingInput { node: String, name: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("node {node}: {message}")]
    Validation { node: String, message: String },

    #[error("node {node}: execute did not populate output {name}")]
    MissingOutput { node: String, name: String },

    #[error("a node named {0} is already registered")]
    DuplicateName(String),

    #[error("unknown node {0}")]
    UnknownNode(String),

    #[error("input port {node}.{port} already has a feeder")]
    PortOccupied { node: String, port: String },

    #[error("edge {src} -> {dst} would introduce a cycle")]
    CycleIntroduced { src: String, dst: String },

    #[error("graph contains a cycle")]
    CycleDetected,
}

impl EngineError {
    pub(crate) fn missing_parameter(node: &str, name: &str) -> Self {
        Self::MissingParameter {
            node: node.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn missing_input(node: &str, name: &str) -> Self {
        Self::MissingInput {
            node: node.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn missing_output(node: &str, name: &str) -> Self {
        Self::MissingOutput {
            node: node.to_string(),
            name: name.to_string(),
        }
    }

    pub(crate) fn validation(node: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            node: node.to_string(),
            message: message.into(),
        }
    }
}
