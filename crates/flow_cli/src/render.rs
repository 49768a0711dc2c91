use std::fmt::Write;

use chat_core::{ConversationTree, HeuristicTokenCounter, TokenCounter};

/// One line per active-path message, noting where alternatives exist.
pub fn active_path(tree: &ConversationTree) -> String {
    let mut out = String::new();
    if tree.is_empty() {
        out.push_str("(empty conversation)\n");
        return out;
    }

    for (index, node) in tree.active_path().enumerate() {
        let siblings = tree.find_owning_set(node.id).map_or(1, |set| set.len());
        let position = tree
            .find_owning_set(node.id)
            .and_then(|set| set.position(node.id))
            .unwrap_or(0);
        let branch = if siblings > 1 {
            format!(" [{}/{}]", position + 1, siblings)
        } else {
            String::new()
        };
        let text = if node.value.is_pending() {
            "<pending>".to_string()
        } else {
            preview(node.value.text())
        };
        let _ = writeln!(out, "{:>3} {:<9}{} {}", index + 1, node.value.role.label(), branch, text);
    }

    let values = tree.active_path_values();
    let tokens = HeuristicTokenCounter::default().count_values(&values);
    let _ = writeln!(
        out,
        "{} messages on the active path, {} branches, ~{} tokens",
        values.len(),
        tree.leaf_count(),
        tokens
    );
    out
}

fn preview(text: &str) -> String {
    const MAX: usize = 100;
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= MAX {
        return single_line;
    }
    let cut: String = single_line.chars().take(MAX).collect();
    format!("{cut}...")
}
