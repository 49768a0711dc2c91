use async_trait::async_trait;
use chat_core::{MessageId, TreeId};

/// How a slot settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed,
    Cancelled,
    Failed(String),
    /// The slot was deleted while streaming.
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// One slot settled; its content is final.
    Completed {
        tree_id: TreeId,
        message_id: MessageId,
        outcome: GenerationOutcome,
    },
    /// The queue found no more pending work.
    Idle,
}

impl CompletionEvent {
    pub fn tree_id(&self) -> Option<TreeId> {
        match self {
            Self::Completed { tree_id, .. } => Some(*tree_id),
            Self::Idle => None,
        }
    }
}

/// Receives every completion event, system wide.
///
/// Called from the queue's drain task before it looks for more work, so anything
/// a listener submits is picked up by the same drain.
#[async_trait]
pub trait CompletionListener: Send + Sync {
    async fn on_generation_event(&self, event: &CompletionEvent);
}
