//! Local generation service that echoes the conversation back.

use async_trait::async_trait;
use chat_core::Role;
use futures::stream;
use tokio_util::sync::CancellationToken;

use crate::service::{GenerationChunk, GenerationRequest, GenerationService, GenerationStream, Result};

/// Streams `"<prefix><last user message>"` back word by word.
///
/// Deterministic and offline, for dry runs of flows.
#[derive(Debug, Clone)]
pub struct EchoGenerationService {
    prefix: String,
}

impl EchoGenerationService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn reply_for(&self, request: &GenerationRequest) -> String {
        let last_user = request
            .history
            .iter()
            .rev()
            .find(|value| value.role == Role::User)
            .map(|value| value.text())
            .unwrap_or_default();
        format!("{}{}", self.prefix, last_user)
    }
}

impl Default for EchoGenerationService {
    fn default() -> Self {
        Self::new("Echo: ")
    }
}

#[async_trait]
impl GenerationService for EchoGenerationService {
    async fn generate(
        &self,
        request: GenerationRequest,
        _cancel: CancellationToken,
    ) -> Result<GenerationStream> {
        let reply = self.reply_for(&request);
        let mut chunks: Vec<Result<GenerationChunk>> = reply
            .split_inclusive(' ')
            .map(|word| Ok(GenerationChunk::Token(word.to_string())))
            .collect();
        chunks.push(Ok(GenerationChunk::Done));
        Ok(Box::pin(stream::iter(chunks)))
    }
}
