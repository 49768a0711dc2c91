//! Snapshot codec for conversation trees.
//!
//! The wire shape mirrors the tree: an alternative set is
//! `{messages: [{value, answerAlternatives}], activeMessageIndex}` and a tree is
//! its root set, or `null` when empty.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{MessageNode, MessageValue};
use crate::tree::{AlternativeSet, ConversationTree, TreeId};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Invalid tree snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeSetSnapshot {
    #[serde(default)]
    pub messages: Vec<MessageSnapshot>,
    #[serde(default, alias = "activeIndex")]
    pub active_message_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSnapshot {
    pub value: MessageValue,
    #[serde(default)]
    pub answer_alternatives: Option<AlternativeSetSnapshot>,
}

impl From<&AlternativeSet> for AlternativeSetSnapshot {
    fn from(set: &AlternativeSet) -> Self {
        Self {
            messages: set.messages().iter().map(MessageSnapshot::from).collect(),
            active_message_index: set.active_index() as i64,
        }
    }
}

impl From<&MessageNode> for MessageSnapshot {
    fn from(node: &MessageNode) -> Self {
        Self {
            value: node.value.clone(),
            answer_alternatives: node.answers.as_ref().map(AlternativeSetSnapshot::from),
        }
    }
}

impl AlternativeSetSnapshot {
    /// Rebuilds a live set with fresh message ids.
    ///
    /// Empty sets become `None` and an out-of-range index is clamped, so older
    /// or hand-edited snapshots always load into a valid tree.
    fn into_set(self) -> Option<AlternativeSet> {
        let messages: Vec<MessageNode> = self
            .messages
            .into_iter()
            .map(|snapshot| {
                let mut node = MessageNode::new(snapshot.value);
                node.answers = snapshot
                    .answer_alternatives
                    .and_then(AlternativeSetSnapshot::into_set);
                node
            })
            .collect();
        let active_index = usize::try_from(self.active_message_index).unwrap_or(0);
        AlternativeSet::from_parts(messages, active_index)
    }
}

impl ConversationTree {
    pub fn to_snapshot(&self) -> Option<AlternativeSetSnapshot> {
        self.root().map(AlternativeSetSnapshot::from)
    }

    pub fn from_snapshot(snapshot: Option<AlternativeSetSnapshot>) -> Self {
        Self::from_snapshot_with_id(TreeId::new(), snapshot)
    }

    pub fn from_snapshot_with_id(id: TreeId, snapshot: Option<AlternativeSetSnapshot>) -> Self {
        let mut tree = Self::with_id(id);
        tree.root = snapshot.and_then(AlternativeSetSnapshot::into_set);
        tree
    }

    /// Replaces this tree's content with a snapshot, keeping id and subscribers.
    pub fn restore(&mut self, snapshot: Option<AlternativeSetSnapshot>) {
        self.replace_root(snapshot.and_then(AlternativeSetSnapshot::into_set));
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Option<AlternativeSetSnapshot> = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::CycleDirection;

    fn branch_counts(tree: &ConversationTree) -> Vec<usize> {
        tree.active_path().map(|m| m.answer_count()).collect()
    }

    #[test]
    fn test_round_trip_preserves_active_path_and_branches() {
        let mut tree = ConversationTree::new();
        tree.add_message(MessageValue::system("be brief"));
        let q = tree.add_message(MessageValue::user("q"));
        let a = tree.add_message(MessageValue::assistant("a"));
        tree.add_alternative(a, MessageValue::assistant("b")).unwrap();
        let c = tree.add_alternative(a, MessageValue::assistant("c")).unwrap();
        tree.add_message(MessageValue::user("follow"));
        tree.cycle_alternatives(c, CycleDirection::Previous);
        tree.add_message(MessageValue::pending_assistant().with_agent(Some("coder".into())));
        tree.delete_message(c);
        tree.add_alternative(q, MessageValue::user("q again")).unwrap();
        tree.cycle_alternatives(q, CycleDirection::Next);

        let restored = ConversationTree::from_json(&tree.to_json().unwrap()).unwrap();
        assert_eq!(restored.active_path_values(), tree.active_path_values());
        assert_eq!(branch_counts(&restored), branch_counts(&tree));
        assert_eq!(restored.len(), tree.len());
        assert_eq!(restored.leaf_count(), tree.leaf_count());
        assert!(restored.find_first_pending_assistant_message().is_some());
    }

    #[test]
    fn test_empty_tree_is_null() {
        let tree = ConversationTree::new();
        assert_eq!(tree.to_json().unwrap(), "null");
        assert!(ConversationTree::from_json("null").unwrap().is_empty());
    }

    #[test]
    fn test_wire_format_uses_camel_case() {
        let mut tree = ConversationTree::new();
        tree.add_message(MessageValue::user("hi"));
        let json = serde_json::to_value(tree.to_snapshot()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [{
                    "value": {"role": "user", "content": "hi"},
                    "answerAlternatives": null
                }],
                "activeMessageIndex": 0
            })
        );
    }

    #[test]
    fn test_malformed_indexes_and_empty_sets_are_normalized() {
        let json = r#"{
            "messages": [
                {"value": {"role": "user", "content": "q"},
                 "answerAlternatives": {"messages": [], "activeMessageIndex": -1}},
                {"value": {"role": "user", "content": "r", "extra": 1}}
            ],
            "activeIndex": 7
        }"#;
        let tree = ConversationTree::from_json(json).unwrap();
        let root = tree.root().unwrap();
        assert_eq!(root.active_index(), 1);
        assert!(root.messages()[0].answers.is_none());
        assert_eq!(tree.last_message_on_active_path().unwrap().value.text(), "r");
    }
}
