use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{ActivePath, AlternativeSet, CycleDirection, TreeChange, TreeEvent};
use crate::message::{MessageId, MessageNode, MessageValue};

const EVENT_CAPACITY: usize = 256;

/// Identifier of a conversation tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeId(Uuid);

impl TreeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TreeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A branching conversation.
///
/// The tree exclusively owns every node reachable from `root`. Nodes are
/// addressed by [`MessageId`]; owning sets are found by search, never stored.
#[derive(Debug)]
pub struct ConversationTree {
    id: TreeId,
    pub(crate) root: Option<AlternativeSet>,
    events: broadcast::Sender<TreeEvent>,
}

impl Default for ConversationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationTree {
    pub fn new() -> Self {
        Self::with_id(TreeId::new())
    }

    pub fn with_id(id: TreeId) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id,
            root: None,
            events,
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn root(&self) -> Option<&AlternativeSet> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Total number of messages in the tree, on every branch.
    pub fn len(&self) -> usize {
        fn count(set: &AlternativeSet) -> usize {
            set.messages
                .iter()
                .map(|m| 1 + m.answers.as_ref().map_or(0, count))
                .sum()
        }
        self.root.as_ref().map_or(0, count)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }

    pub(crate) fn event_sender(&self) -> broadcast::Sender<TreeEvent> {
        self.events.clone()
    }

    fn notify(&self, change: TreeChange) {
        // No receivers is not an error for a tree nobody renders.
        let _ = self.events.send(TreeEvent {
            tree_id: self.id,
            change,
        });
    }

    /// Replaces the whole content, keeping the tree id and subscribers.
    pub(crate) fn replace_root(&mut self, root: Option<AlternativeSet>) {
        self.root = root;
        self.notify(TreeChange::Replaced);
    }

    // ========== Active path ==========

    pub fn active_path(&self) -> ActivePath<'_> {
        ActivePath::new(self.root.as_ref())
    }

    pub fn active_path_values(&self) -> Vec<MessageValue> {
        self.active_path().map(|m| m.value.clone()).collect()
    }

    pub fn active_path_messages(&self) -> Vec<MessageId> {
        self.active_path().map(|m| m.id).collect()
    }

    pub fn last_message_on_active_path(&self) -> Option<&MessageNode> {
        self.active_path().last()
    }

    // ========== Lookup ==========

    pub fn message(&self, id: MessageId) -> Option<&MessageNode> {
        find_node(self.root.as_ref()?, id)
    }

    fn message_mut(&mut self, id: MessageId) -> Option<&mut MessageNode> {
        find_node_mut(self.root.as_mut()?, id)
    }

    /// The set directly containing `id`, or `None` when it is not in this tree.
    pub fn find_owning_set(&self, id: MessageId) -> Option<&AlternativeSet> {
        find_set(self.root.as_ref()?, id)
    }

    /// First assistant slot still awaiting generation, in pre-order over the
    /// entire tree (inactive branches included).
    pub fn find_first_pending_assistant_message(&self) -> Option<MessageId> {
        find_pending(self.root.as_ref()?)
    }

    /// Values of every ancestor of `target` along its tree path, root first.
    pub fn history_before(&self, target: MessageId) -> Option<Vec<MessageValue>> {
        let mut history = Vec::new();
        collect_history(self.root.as_ref()?, target, &mut history).then_some(history)
    }

    /// Every leaf-terminated path starting at `id` (inclusive), in creation order.
    pub fn leaf_paths_under(&self, id: MessageId) -> Option<Vec<Vec<&MessageNode>>> {
        let node = self.message(id)?;
        let mut paths = Vec::new();
        collect_leaf_paths(node, &mut Vec::new(), &mut paths);
        Some(paths)
    }

    /// Number of root-to-leaf paths across all branches.
    pub fn leaf_count(&self) -> usize {
        fn leaves(set: &AlternativeSet) -> usize {
            set.messages
                .iter()
                .map(|m| m.answers.as_ref().map_or(1, leaves))
                .sum()
        }
        self.root.as_ref().map_or(0, leaves)
    }

    // ========== Mutation ==========

    /// Appends `value` below the last message of the active path and makes it active.
    pub fn add_message(&mut self, value: MessageValue) -> MessageId {
        let node = MessageNode::new(value);
        let id = node.id;

        let last = self.last_message_on_active_path().map(|m| m.id);
        match last.and_then(|last| self.message_mut(last)) {
            Some(parent) => match parent.answers.as_mut() {
                Some(set) => {
                    set.push_active(node);
                }
                None => parent.answers = Some(AlternativeSet::new(node)),
            },
            None => self.root = Some(AlternativeSet::new(node)),
        }

        tracing::debug!(tree_id = %self.id, message_id = %id, "ConversationTree: message added");
        self.notify(TreeChange::MessageAdded { message_id: id });
        id
    }

    /// Inserts `value` as a new active sibling of `existing`.
    pub fn add_alternative(&mut self, existing: MessageId, value: MessageValue) -> Option<MessageId> {
        let node = MessageNode::new(value);
        let id = edit_owning_set(&mut self.root, existing, &mut |set| set.push_active(node.clone()))?;
        tracing::debug!(
            tree_id = %self.id,
            sibling_of = %existing,
            message_id = %id,
            "ConversationTree: alternative added"
        );
        self.notify(TreeChange::MessageAdded { message_id: id });
        Some(id)
    }

    /// Removes `id` and everything beneath it. Returns false when not found.
    pub fn delete_message(&mut self, id: MessageId) -> bool {
        let removed = edit_owning_set(&mut self.root, id, &mut |set| {
            set.position(id).map(|index| set.remove(index))
        })
        .flatten();

        if removed.is_none() {
            return false;
        }
        tracing::debug!(tree_id = %self.id, message_id = %id, "ConversationTree: message deleted");
        self.notify(TreeChange::MessageDeleted { message_id: id });
        true
    }

    /// Removes `id` but splices its answers into its slot, keeping every branch
    /// beneath it reachable.
    pub fn delete_message_and_preserve_children(&mut self, id: MessageId) -> bool {
        let removed = edit_owning_set(&mut self.root, id, &mut |set| {
            set.position(id).map(|index| set.replace_with_children(index))
        })
        .flatten();

        if removed.is_none() {
            return false;
        }
        tracing::debug!(
            tree_id = %self.id,
            message_id = %id,
            "ConversationTree: message deleted, children reparented"
        );
        self.notify(TreeChange::MessageDeleted { message_id: id });
        true
    }

    /// Rotates the active sibling in the set owning `id`.
    pub fn cycle_alternatives(&mut self, id: MessageId, direction: CycleDirection) -> bool {
        let changed = edit_owning_set(&mut self.root, id, &mut |set| set.cycle(direction)).unwrap_or(false);
        if changed {
            self.notify(TreeChange::ActiveChanged { message_id: id });
        }
        changed
    }

    /// Makes `id` the active message of its owning set.
    pub fn set_active(&mut self, id: MessageId) -> bool {
        let changed = edit_owning_set(&mut self.root, id, &mut |set| {
            set.position(id).is_some_and(|index| set.set_active(index))
        })
        .unwrap_or(false);
        if changed {
            self.notify(TreeChange::ActiveChanged { message_id: id });
        }
        changed
    }

    pub fn set_content(&mut self, id: MessageId, content: Option<String>) -> bool {
        let Some(node) = self.message_mut(id) else {
            return false;
        };
        node.value.content = content;
        self.notify(TreeChange::ContentUpdated { message_id: id });
        true
    }

    /// Appends streamed text to a message, treating a pending slot as empty.
    pub fn append_content(&mut self, id: MessageId, chunk: &str) -> bool {
        let Some(node) = self.message_mut(id) else {
            return false;
        };
        node.value.content.get_or_insert_with(String::new).push_str(chunk);
        self.notify(TreeChange::ContentUpdated { message_id: id });
        true
    }
}

fn find_node(set: &AlternativeSet, id: MessageId) -> Option<&MessageNode> {
    set.messages.iter().find_map(|node| {
        if node.id == id {
            Some(node)
        } else {
            node.answers.as_ref().and_then(|answers| find_node(answers, id))
        }
    })
}

fn find_node_mut(set: &mut AlternativeSet, id: MessageId) -> Option<&mut MessageNode> {
    for node in set.messages.iter_mut() {
        if node.id == id {
            return Some(node);
        }
        if let Some(answers) = node.answers.as_mut() {
            if let Some(found) = find_node_mut(answers, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_set(set: &AlternativeSet, id: MessageId) -> Option<&AlternativeSet> {
    if set.contains(id) {
        return Some(set);
    }
    set.messages
        .iter()
        .filter_map(|node| node.answers.as_ref())
        .find_map(|answers| find_set(answers, id))
}

/// Runs `edit` on the set owning `id`, then prunes that set if it became empty.
fn edit_owning_set<R>(
    slot: &mut Option<AlternativeSet>,
    id: MessageId,
    edit: &mut dyn FnMut(&mut AlternativeSet) -> R,
) -> Option<R> {
    let set = slot.as_mut()?;
    let mut result = None;
    if set.contains(id) {
        result = Some(edit(set));
    } else {
        for node in set.messages.iter_mut() {
            result = edit_owning_set(&mut node.answers, id, &mut *edit);
            if result.is_some() {
                break;
            }
        }
    }
    if slot.as_ref().is_some_and(AlternativeSet::is_empty) {
        *slot = None;
    }
    result
}

fn find_pending(set: &AlternativeSet) -> Option<MessageId> {
    set.messages.iter().find_map(|node| {
        if node.value.is_pending() {
            Some(node.id)
        } else {
            node.answers.as_ref().and_then(find_pending)
        }
    })
}

fn collect_history(set: &AlternativeSet, target: MessageId, history: &mut Vec<MessageValue>) -> bool {
    for node in &set.messages {
        if node.id == target {
            return true;
        }
        if let Some(answers) = node.answers.as_ref() {
            history.push(node.value.clone());
            if collect_history(answers, target, history) {
                return true;
            }
            history.pop();
        }
    }
    false
}

fn collect_leaf_paths<'a>(
    node: &'a MessageNode,
    current: &mut Vec<&'a MessageNode>,
    paths: &mut Vec<Vec<&'a MessageNode>>,
) {
    current.push(node);
    match node.answers.as_ref() {
        Some(answers) => {
            for child in &answers.messages {
                collect_leaf_paths(child, current, paths);
            }
        }
        None => paths.push(current.clone()),
    }
    current.pop();
}
