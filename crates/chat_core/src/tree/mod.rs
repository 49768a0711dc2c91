//! Tree module - the branching conversation store
//!
//! A conversation alternates `AlternativeSet -> MessageNode -> AlternativeSet ...`.
//! Following the active index of every set from the root yields the active path.

mod alternatives;
mod conversation;
mod events;
mod handle;
mod path;

pub use alternatives::{AlternativeSet, CycleDirection};
pub use conversation::{ConversationTree, TreeId};
pub use events::{TreeChange, TreeEvent};
pub use handle::TreeHandle;
pub use path::ActivePath;
