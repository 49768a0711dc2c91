use super::AlternativeSet;
use crate::message::MessageNode;

/// Iterator over the active path, top to bottom.
///
/// Borrowed from the tree, so every call to `active_path` sees current state.
#[derive(Debug, Clone)]
pub struct ActivePath<'a> {
    next: Option<&'a AlternativeSet>,
}

impl<'a> ActivePath<'a> {
    pub(crate) fn new(root: Option<&'a AlternativeSet>) -> Self {
        Self { next: root }
    }
}

impl<'a> Iterator for ActivePath<'a> {
    type Item = &'a MessageNode;

    fn next(&mut self) -> Option<Self::Item> {
        let set = self.next?;
        let node = set.active();
        self.next = node.answers.as_ref();
        Some(node)
    }
}
