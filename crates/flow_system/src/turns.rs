//! Grouping the active path into turns, and pruning turns from its end.

use std::ops::Range;

use chat_core::{ConversationTree, MessageId, MessageNode};

use crate::error::{FlowError, Result};

/// Splits a path into turns: a non-AI message plus the AI messages right after
/// it. AI messages at the very start form a turn of their own.
pub fn group_turns<'a>(path: &[&'a MessageNode]) -> Vec<Vec<&'a MessageNode>> {
    let mut turns: Vec<Vec<&MessageNode>> = Vec::new();
    for &node in path {
        match turns.last_mut() {
            Some(turn) if node.value.role.is_ai() => turn.push(node),
            _ => turns.push(vec![node]),
        }
    }
    turns
}

/// Splits a path into segments: each non-AI message alone, and each run of
/// consecutive AI messages together.
pub fn group_segments<'a>(path: &[&'a MessageNode]) -> Vec<Vec<&'a MessageNode>> {
    let mut segments: Vec<Vec<&MessageNode>> = Vec::new();
    for &node in path {
        match segments.last_mut() {
            Some(segment)
                if node.value.role.is_ai() && segment.iter().all(|m| m.value.role.is_ai()) =>
            {
                segment.push(node)
            }
            _ => segments.push(vec![node]),
        }
    }
    segments
}

/// Indices of the turns selected by a range counted from the end (1 = most
/// recent). Bounds are clamped to the available turns.
pub fn turn_range(
    total: usize,
    clear_from: usize,
    clear_to: usize,
    to_beginning: bool,
) -> Result<Range<usize>> {
    if total == 0 {
        return Err(FlowError::step_failed("clear-history", "there are no turns to clear"));
    }
    let from = clear_from.clamp(1, total);
    let to = if to_beginning {
        total
    } else {
        clear_to.clamp(1, total)
    };
    if to < from {
        return Err(FlowError::step_failed(
            "clear-history",
            format!("range {from}..{to} selects no turns"),
        ));
    }
    Ok(total - to..total - from + 1)
}

/// Removes a range of turns from the active path, keeping whatever hangs
/// below them attached. Returns how many turns were removed.
pub fn clear_turns(
    tree: &mut ConversationTree,
    clear_from: usize,
    clear_to: usize,
    to_beginning: bool,
) -> Result<usize> {
    let (doomed, removed_turns) = {
        let path: Vec<&MessageNode> = tree.active_path().collect();
        let turns = group_turns(&path);
        let range = turn_range(turns.len(), clear_from, clear_to, to_beginning)?;
        let doomed: Vec<MessageId> = turns[range.clone()]
            .iter()
            .flatten()
            .map(|node| node.id)
            .collect();
        (doomed, range.len())
    };

    for id in doomed {
        let siblings: Vec<MessageId> = tree
            .find_owning_set(id)
            .map(|set| {
                set.messages()
                    .iter()
                    .map(|m| m.id)
                    .filter(|sibling| *sibling != id)
                    .collect()
            })
            .unwrap_or_default();
        for sibling in siblings {
            tree.delete_message(sibling);
        }
        if !tree.delete_message_and_preserve_children(id) {
            return Err(FlowError::Tree(format!("message {id} vanished while clearing")));
        }
    }
    tracing::debug!(removed_turns, "Cleared turns from the active path");
    Ok(removed_turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::{MessageValue, Role};

    fn three_turns() -> ConversationTree {
        let mut tree = ConversationTree::new();
        for i in 1..=3 {
            tree.add_message(MessageValue::user(format!("q{i}")));
            tree.add_message(MessageValue::assistant(format!("a{i}")));
        }
        tree
    }

    fn path_texts(tree: &ConversationTree) -> Vec<String> {
        tree.active_path_values()
            .iter()
            .map(|v| v.text().to_string())
            .collect()
    }

    #[test]
    fn test_group_turns() {
        let mut tree = ConversationTree::new();
        tree.add_message(MessageValue::assistant("greeting"));
        tree.add_message(MessageValue::user("q"));
        tree.add_message(MessageValue::assistant("a"));
        tree.add_message(MessageValue::tool("t"));
        tree.add_message(MessageValue::user("q2"));
        let path: Vec<_> = tree.active_path().collect();

        let sizes: Vec<usize> = group_turns(&path).iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![1, 3, 1]);
    }

    #[test]
    fn test_group_segments() {
        let mut tree = ConversationTree::new();
        tree.add_message(MessageValue::system("s"));
        tree.add_message(MessageValue::user("q"));
        tree.add_message(MessageValue::assistant("a"));
        tree.add_message(MessageValue::tool("t"));
        let path: Vec<_> = tree.active_path().collect();

        let segments = group_segments(&path);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[2].len(), 2);
        assert!(segments[2].iter().all(|m| m.value.role.is_ai()));
        assert_eq!(segments[1][0].value.role, Role::User);
    }

    #[test]
    fn test_turn_range_clamps() {
        assert_eq!(turn_range(3, 1, 1, false).unwrap(), 2..3);
        assert_eq!(turn_range(3, 2, 3, false).unwrap(), 0..2);
        assert_eq!(turn_range(3, 0, 10, false).unwrap(), 0..3);
        assert_eq!(turn_range(3, 2, 1, true).unwrap(), 0..2);
        assert!(turn_range(3, 3, 2, false).is_err());
        assert!(turn_range(0, 1, 1, false).is_err());
    }

    #[test]
    fn test_clear_last_turn() {
        let mut tree = three_turns();
        assert_eq!(clear_turns(&mut tree, 1, 1, false).unwrap(), 1);
        assert_eq!(path_texts(&tree), vec!["q1", "a1", "q2", "a2"]);
    }

    #[test]
    fn test_clear_middle_turn_keeps_tail_attached() {
        let mut tree = three_turns();
        assert_eq!(clear_turns(&mut tree, 2, 2, false).unwrap(), 1);
        assert_eq!(path_texts(&tree), vec!["q1", "a1", "q3", "a3"]);
    }

    #[test]
    fn test_clear_to_beginning_drops_inactive_siblings() {
        let mut tree = three_turns();
        let a1 = tree.active_path_messages()[1];
        tree.add_alternative(a1, MessageValue::assistant("a1-alt"));
        tree.set_active(a1);

        assert_eq!(clear_turns(&mut tree, 2, 1, true).unwrap(), 2);
        assert_eq!(path_texts(&tree), vec!["q3", "a3"]);
        assert_eq!(tree.leaf_count(), 1);
    }
}
