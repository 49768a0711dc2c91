//! chat_core - Conversation tree and shared types for the chat flow engine
//!
//! - `message` - message values, roles and tree nodes
//! - `tree` - the branching conversation tree, its events and shared handle
//! - `snapshot` - the persisted tree format
//! - `tokens` - token estimation over conversation values
//! - `config` - runtime configuration

pub mod config;
pub mod message;
pub mod snapshot;
pub mod tokens;
pub mod tree;

pub use config::{Config, ConfigError};
pub use message::{MessageId, MessageNode, MessageValue, Role};
pub use snapshot::{AlternativeSetSnapshot, MessageSnapshot, SnapshotError};
pub use tokens::{HeuristicTokenCounter, SharedTokenCounter, TokenCounter};
pub use tree::{
    ActivePath, AlternativeSet, ConversationTree, CycleDirection, TreeChange, TreeEvent,
    TreeHandle, TreeId,
};
