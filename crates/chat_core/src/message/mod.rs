//! Message module - Message values and tree nodes
//!
//! Shared message types used across the system.

mod value;

pub use value::{MessageId, MessageNode, MessageValue, Role};
