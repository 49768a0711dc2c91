//! Behavioural tests for the conversation tree

use chat_core::{ConversationTree, CycleDirection, MessageId, MessageValue, Role};

/// Small deterministic generator so operation sequences are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: usize) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound
    }
}

fn all_ids(tree: &ConversationTree) -> Vec<MessageId> {
    fn walk(set: &chat_core::AlternativeSet, ids: &mut Vec<MessageId>) {
        for node in set.messages() {
            ids.push(node.id);
            if let Some(answers) = node.answers.as_ref() {
                walk(answers, ids);
            }
        }
    }
    let mut ids = Vec::new();
    if let Some(root) = tree.root() {
        walk(root, &mut ids);
    }
    ids
}

fn branch_counts(tree: &ConversationTree) -> Vec<usize> {
    tree.active_path().map(|m| m.answer_count()).collect()
}

#[test]
fn test_scenario_pending_assistant_after_user() {
    let mut tree = ConversationTree::new();
    tree.add_message(MessageValue::user("hi"));
    let pending = tree.add_message(MessageValue::pending_assistant());

    assert_eq!(tree.find_first_pending_assistant_message(), Some(pending));
}

#[test]
fn test_last_message_tracks_every_add() {
    let mut rng = Lcg(7);
    let mut tree = ConversationTree::new();
    for i in 0..50 {
        // Mix in alternatives so the active path keeps moving between branches.
        if i % 5 == 4 {
            let ids = all_ids(&tree);
            let target = ids[rng.next(ids.len())];
            tree.add_alternative(target, MessageValue::assistant(format!("alt {i}")));
        }
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        let id = tree.add_message(MessageValue::new(role, format!("m{i}")));
        assert_eq!(tree.last_message_on_active_path().map(|m| m.id), Some(id));
    }
}

#[test]
fn test_snapshot_round_trip_over_random_edits() {
    for seed in 1..20 {
        let mut rng = Lcg(seed);
        let mut tree = ConversationTree::new();
        for step in 0..40 {
            let ids = all_ids(&tree);
            match rng.next(4) {
                0 | 1 => {
                    tree.add_message(MessageValue::user(format!("s{seed} m{step}")));
                }
                2 if !ids.is_empty() => {
                    let target = ids[rng.next(ids.len())];
                    tree.add_alternative(target, MessageValue::assistant(format!("alt {step}")));
                }
                3 if ids.len() > 3 => {
                    let target = ids[rng.next(ids.len())];
                    tree.delete_message(target);
                }
                _ => {}
            }
        }

        let json = tree.to_json().unwrap();
        let restored = ConversationTree::from_json(&json).unwrap();
        assert_eq!(restored.active_path_values(), tree.active_path_values(), "seed {seed}");
        assert_eq!(branch_counts(&restored), branch_counts(&tree), "seed {seed}");
        assert_eq!(restored.len(), tree.len(), "seed {seed}");
    }
}

#[test]
fn test_preserving_delete_never_loses_child_branches() {
    for seed in 1..20 {
        let mut rng = Lcg(seed * 31);
        let mut tree = ConversationTree::new();
        for step in 0..30 {
            let ids = all_ids(&tree);
            if !ids.is_empty() && rng.next(3) == 0 {
                let target = ids[rng.next(ids.len())];
                tree.add_alternative(target, MessageValue::assistant(format!("alt {step}")));
            } else {
                tree.add_message(MessageValue::user(format!("m{step}")));
            }
        }

        let ids = all_ids(&tree);
        let victim = ids[rng.next(ids.len())];
        let child_leaves: usize = tree
            .message(victim)
            .and_then(|m| m.answers.as_ref())
            .map(|answers| {
                answers
                    .messages()
                    .iter()
                    .map(|child| tree.leaf_paths_under(child.id).unwrap().len())
                    .sum()
            })
            .unwrap_or(0);
        let leaves_before = tree.leaf_count();

        assert!(tree.delete_message_and_preserve_children(victim));
        assert!(tree.leaf_count() >= child_leaves, "seed {seed}");
        if child_leaves > 0 {
            assert_eq!(tree.leaf_count(), leaves_before, "seed {seed}");
        } else {
            // A childless victim costs at most its own leaf.
            assert!(tree.leaf_count() + 1 >= leaves_before, "seed {seed}");
        }
        assert!(tree.message(victim).is_none());
    }
}

#[test]
fn test_cycle_is_a_bijection() {
    let mut tree = ConversationTree::new();
    tree.add_message(MessageValue::user("q"));
    let first = tree.add_message(MessageValue::assistant("a0"));
    for i in 1..4 {
        tree.add_alternative(first, MessageValue::assistant(format!("a{i}")));
    }

    for _ in 0..4 {
        let before = tree.find_owning_set(first).unwrap().active_index();
        tree.cycle_alternatives(first, CycleDirection::Next);
        tree.cycle_alternatives(first, CycleDirection::Previous);
        assert_eq!(tree.find_owning_set(first).unwrap().active_index(), before);

        tree.cycle_alternatives(first, CycleDirection::Previous);
        tree.cycle_alternatives(first, CycleDirection::Next);
        assert_eq!(tree.find_owning_set(first).unwrap().active_index(), before);

        tree.cycle_alternatives(first, CycleDirection::Next);
    }
}

#[test]
fn test_operations_on_foreign_messages_are_noops() {
    let mut tree = ConversationTree::new();
    let mut other = ConversationTree::new();
    tree.add_message(MessageValue::user("mine"));
    let foreign = other.add_message(MessageValue::user("theirs"));

    assert!(tree.find_owning_set(foreign).is_none());
    assert!(tree.add_alternative(foreign, MessageValue::user("x")).is_none());
    assert!(!tree.delete_message(foreign));
    assert!(!tree.delete_message_and_preserve_children(foreign));
    assert!(!tree.cycle_alternatives(foreign, CycleDirection::Next));
    assert!(tree.history_before(foreign).is_none());
    assert_eq!(tree.len(), 1);
}
