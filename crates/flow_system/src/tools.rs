//! Tool-call collaborator used by manual tool-call steps.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ToolCallError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallOutput {
    pub content: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallOutput {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

impl From<ToolCallError> for ToolCallOutput {
    fn from(error: ToolCallError) -> Self {
        Self::error(error.to_string())
    }
}

/// Invokes an external tool by name.
#[async_trait]
pub trait ToolCaller: Send + Sync {
    async fn call_tool(&self, request: &ToolCallRequest) -> Result<ToolCallOutput, ToolCallError>;
}
