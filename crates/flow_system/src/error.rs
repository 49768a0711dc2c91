//! Flow error types

use thiserror::Error;

use crate::graph::{FlowId, StepId};

/// Everything that can halt a flow or fail a flow operation.
#[derive(Error, Debug)]
pub enum FlowError {
    /// A step is missing required settings, e.g. an empty prompt.
    #[error("Step {step_type} is not configured: {message}")]
    Configuration { step_type: String, message: String },

    #[error("Invalid data for step {step_type}: {message}")]
    InvalidData { step_type: String, message: String },

    /// A step ran but its preconditions on the conversation did not hold.
    #[error("Step {step_type} failed: {message}")]
    StepFailed { step_type: String, message: String },

    #[error("Flow has no start step")]
    NoStartStep,

    #[error("Flow has more than one start step: {}", join_ids(.0))]
    AmbiguousStart(Vec<StepId>),

    #[error("Step not found: {0}")]
    StepNotFound(StepId),

    #[error("Connection {from} --{output}--> {to} points at a missing step")]
    DanglingConnection {
        from: StepId,
        to: StepId,
        output: String,
    },

    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    #[error("Step type {step_type} has no output named {output}")]
    UnknownOutput { step_type: String, output: String },

    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    #[error("Step type {0} submitted a prompt but does not wait for generation")]
    UnexpectedSuspension(String),

    #[error("Flow ran {0} steps without waiting for generation")]
    DispatchLimit(usize),

    #[error("Conversation tree operation failed: {0}")]
    Tree(String),

    #[error("Flow is already running")]
    AlreadyRunning,

    #[error("Flow not found: {0}")]
    FlowNotFound(FlowId),

    /// The id cannot be used as a file name in the data directory.
    #[error("Invalid flow id: {0}")]
    InvalidFlowId(FlowId),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Snapshot(#[from] chat_core::SnapshotError),
}

pub type Result<T> = std::result::Result<T, FlowError>;

impl FlowError {
    pub fn configuration(step_type: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            step_type: step_type.to_string(),
            message: message.into(),
        }
    }

    pub fn step_failed(step_type: &str, message: impl Into<String>) -> Self {
        Self::StepFailed {
            step_type: step_type.to_string(),
            message: message.into(),
        }
    }
}

fn join_ids(ids: &[StepId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
