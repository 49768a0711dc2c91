use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, MutexGuard};

use super::{ConversationTree, TreeEvent, TreeId};

/// Shared, lockable handle to a tree owned by a chat session.
///
/// The generation queue and a flow runner each keep a clone; the id is readable
/// without taking the lock.
#[derive(Debug, Clone)]
pub struct TreeHandle {
    id: TreeId,
    events: broadcast::Sender<TreeEvent>,
    inner: Arc<Mutex<ConversationTree>>,
}

impl TreeHandle {
    pub fn new(tree: ConversationTree) -> Self {
        Self {
            id: tree.id(),
            events: tree.event_sender(),
            inner: Arc::new(Mutex::new(tree)),
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, ConversationTree> {
        self.inner.lock().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.events.subscribe()
    }
}
