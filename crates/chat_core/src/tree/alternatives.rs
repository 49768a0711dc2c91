use serde::{Deserialize, Serialize};

use crate::message::{MessageId, MessageNode};

/// Direction used when rotating through sibling alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleDirection {
    Next,
    Previous,
}

/// Sibling messages competing as the next step of a branch.
///
/// A stored set is never empty: a deletion that removes the last sibling prunes
/// the whole set from its parent, so `active_index` always points at a message.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeSet {
    pub(crate) messages: Vec<MessageNode>,
    pub(crate) active_index: usize,
}

impl AlternativeSet {
    pub(crate) fn new(first: MessageNode) -> Self {
        Self {
            messages: vec![first],
            active_index: 0,
        }
    }

    /// Builds a set from already-validated parts; `None` when `messages` is empty.
    pub(crate) fn from_parts(messages: Vec<MessageNode>, active_index: usize) -> Option<Self> {
        if messages.is_empty() {
            return None;
        }
        let active_index = active_index.min(messages.len() - 1);
        Some(Self {
            messages,
            active_index,
        })
    }

    /// Messages in creation order.
    pub fn messages(&self) -> &[MessageNode] {
        &self.messages
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active(&self) -> &MessageNode {
        &self.messages[self.active_index]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn position(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.position(id).is_some()
    }

    /// Appends a sibling and makes it the active one.
    pub(crate) fn push_active(&mut self, node: MessageNode) -> MessageId {
        let id = node.id;
        self.messages.push(node);
        self.active_index = self.messages.len() - 1;
        id
    }

    /// Rotates the active index; returns false when there is nothing to rotate.
    pub(crate) fn cycle(&mut self, direction: CycleDirection) -> bool {
        let len = self.messages.len();
        if len < 2 {
            return false;
        }
        self.active_index = match direction {
            CycleDirection::Next => (self.active_index + 1) % len,
            CycleDirection::Previous => (self.active_index + len - 1) % len,
        };
        true
    }

    /// Removes the message at `index` together with everything beneath it.
    ///
    /// An active index at or past the removed slot moves down by one.
    pub(crate) fn remove(&mut self, index: usize) -> MessageNode {
        let node = self.messages.remove(index);
        if self.active_index >= index {
            self.active_index = self.active_index.saturating_sub(1);
        }
        node
    }

    /// Removes the message at `index` and splices its own answers into its slot.
    pub(crate) fn replace_with_children(&mut self, index: usize) -> MessageNode {
        let was_active = self.active_index == index;
        let mut node = self.messages.remove(index);
        let (children, child_active) = match node.answers.take() {
            Some(set) => (set.messages, set.active_index),
            None => (Vec::new(), 0),
        };
        let child_count = children.len();
        self.messages.splice(index..index, children);

        if was_active {
            self.active_index = if child_count > 0 {
                index + child_active
            } else {
                index.saturating_sub(1)
            };
        } else if self.active_index > index {
            // active_index > index >= 0, so this never underflows
            self.active_index = self.active_index + child_count - 1;
        }
        node
    }

    pub(crate) fn set_active(&mut self, index: usize) -> bool {
        if index < self.messages.len() {
            self.active_index = index;
            true
        } else {
            false
        }
    }
}
