use std::pin::Pin;

use async_trait::async_trait;
use chat_core::{Config, MessageId, MessageValue, TreeId};
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone)]
pub enum GenerationError {
    #[error("Generation service error: {0}")]
    Service(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, GenerationError>;

/// A piece of incrementally produced output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationChunk {
    Token(String),
    Done,
}

pub type GenerationStream = Pin<Box<dyn Stream<Item = Result<GenerationChunk>> + Send>>;

/// Model parameters forwarded with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
}

impl From<&Config> for GenerationParams {
    fn from(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub tree_id: TreeId,
    pub message_id: MessageId,
    /// Ancestors of the slot being filled, root first.
    pub history: Vec<MessageValue>,
    /// Agent requested by the pending slot, if any.
    pub agent: Option<String>,
    pub params: GenerationParams,
}

/// The model backend.
///
/// Implementations return a stream of chunks terminated by [`GenerationChunk::Done`]
/// (or end of stream) and should stop promptly once `cancel` fires.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationStream>;
}
