use serde::{Deserialize, Serialize};

use super::TreeId;
use crate::message::MessageId;

/// What changed in a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeChange {
    MessageAdded { message_id: MessageId },
    ContentUpdated { message_id: MessageId },
    MessageDeleted { message_id: MessageId },
    ActiveChanged { message_id: MessageId },
    Replaced,
}

/// Change notification published after every tree mutation.
///
/// Delivered over a broadcast channel, so observers run after the mutation has
/// returned and can never re-enter it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEvent {
    pub tree_id: TreeId,
    pub change: TreeChange,
}
