use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tree::AlternativeSet;

/// Author of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Assistant and tool messages are produced by the AI side of a turn.
    pub fn is_ai(self) -> bool {
        matches!(self, Role::Assistant | Role::Tool)
    }

    /// Label used when a conversation is rendered back into a prompt.
    pub fn label(self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
        }
    }
}

/// Stable handle to a message inside a [`crate::ConversationTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The payload of a message as it is stored, rendered and sent as history.
///
/// `content == None` on an assistant message marks a slot awaiting generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageValue {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl MessageValue {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            agent: None,
            metadata: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// An assistant slot waiting for the generation queue.
    pub fn pending_assistant() -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            agent: None,
            metadata: None,
        }
    }

    pub fn with_agent(mut self, agent: Option<String>) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.role == Role::Assistant && self.content.is_none()
    }

    /// Content with the pending sentinel rendered as an empty string.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// A message together with the alternatives competing to answer it.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageNode {
    pub id: MessageId,
    pub value: MessageValue,
    pub answers: Option<AlternativeSet>,
}

impl MessageNode {
    pub fn new(value: MessageValue) -> Self {
        Self {
            id: MessageId::new(),
            value,
            answers: None,
        }
    }

    /// Number of alternatives answering this message.
    pub fn answer_count(&self) -> usize {
        self.answers.as_ref().map_or(0, AlternativeSet::len)
    }

    pub fn is_branch_point(&self) -> bool {
        self.answer_count() > 1
    }
}
