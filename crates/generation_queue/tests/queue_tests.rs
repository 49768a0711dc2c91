//! Integration tests for the generation queue

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chat_core::{ConversationTree, MessageId, MessageValue, TreeHandle};
use futures::stream;
use generation_queue::{
    CompletionEvent, CompletionListener, EchoGenerationService, GenerationChunk, GenerationError,
    GenerationOutcome, GenerationParams, GenerationQueue, GenerationRequest, GenerationService,
    GenerationStream, CANCELLED_MARKER,
};
use tokio_util::sync::CancellationToken;

/// Records the slots it was asked to fill and replies with a fixed script.
#[derive(Default)]
struct ScriptedService {
    seen: StdMutex<Vec<MessageId>>,
    fail: bool,
    hang: bool,
    /// Never hands back a stream and ignores the cancel token.
    stall: bool,
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn generate(
        &self,
        request: GenerationRequest,
        _cancel: CancellationToken,
    ) -> Result<GenerationStream, GenerationError> {
        self.seen.lock().unwrap().push(request.message_id);
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(GenerationError::Service("backend unavailable".into()));
        }
        if self.hang {
            return Ok(Box::pin(stream::pending()));
        }
        let reply = format!("reply to {} messages", request.history.len());
        let chunks: Vec<Result<GenerationChunk, GenerationError>> = vec![
            Ok(GenerationChunk::Token(reply)),
            Ok(GenerationChunk::Done),
        ];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[derive(Default)]
struct RecordingListener {
    events: StdMutex<Vec<CompletionEvent>>,
}

#[async_trait]
impl CompletionListener for RecordingListener {
    async fn on_generation_event(&self, event: &CompletionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn tree_with_pending(prompt: &str) -> (TreeHandle, MessageId) {
    let mut tree = ConversationTree::new();
    tree.add_message(MessageValue::user(prompt));
    let slot = tree.add_message(MessageValue::pending_assistant());
    (TreeHandle::new(tree), slot)
}

async fn content(tree: &TreeHandle, id: MessageId) -> Option<String> {
    tree.lock().await.message(id).and_then(|m| m.value.content.clone())
}

async fn drain(queue: &Arc<GenerationQueue>) {
    let idle = queue.when_idle().await;
    idle.await.unwrap();
}

#[tokio::test]
async fn test_echo_fills_pending_slot() {
    let queue = GenerationQueue::new(Arc::new(EchoGenerationService::default()), GenerationParams::default());
    let (tree, slot) = tree_with_pending("hello there");
    queue.open_tree(tree.clone()).await;

    queue.schedule();
    drain(&queue).await;

    assert_eq!(content(&tree, slot).await.as_deref(), Some("Echo: hello there"));
    assert!(!queue.is_busy());
}

#[tokio::test]
async fn test_pending_slots_are_served_in_scan_order() {
    let service = Arc::new(ScriptedService::default());
    let queue = GenerationQueue::new(service.clone(), GenerationParams::default());

    let (first_tree, first_slot) = tree_with_pending("one");
    let (second_tree, second_slot) = tree_with_pending("two");
    let third_slot = {
        let mut guard = first_tree.lock().await;
        guard
            .add_alternative(first_slot, MessageValue::pending_assistant())
            .unwrap()
    };
    queue.open_tree(first_tree.clone()).await;
    queue.open_tree(second_tree.clone()).await;

    queue.schedule();
    queue.schedule();
    drain(&queue).await;

    assert_eq!(
        *service.seen.lock().unwrap(),
        vec![first_slot, third_slot, second_slot]
    );
    assert_eq!(content(&first_tree, third_slot).await.as_deref(), Some("reply to 1 messages"));
    assert!(first_tree.lock().await.find_first_pending_assistant_message().is_none());
    assert!(second_tree.lock().await.find_first_pending_assistant_message().is_none());
}

#[tokio::test]
async fn test_service_failure_is_written_into_slot() {
    let service = Arc::new(ScriptedService {
        fail: true,
        ..Default::default()
    });
    let queue = GenerationQueue::new(service.clone(), GenerationParams::default());
    let (tree, slot) = tree_with_pending("q");
    queue.open_tree(tree.clone()).await;

    queue.schedule();
    drain(&queue).await;

    let text = content(&tree, slot).await.unwrap();
    assert!(text.starts_with("[Generation error: "), "{text}");
    assert!(text.contains("backend unavailable"));
    // Settled slots are not picked up again.
    queue.schedule();
    drain(&queue).await;
    assert_eq!(service.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_abort_settles_with_marker() {
    let service = Arc::new(ScriptedService {
        hang: true,
        ..Default::default()
    });
    let queue = GenerationQueue::new(service.clone(), GenerationParams::default());
    let (tree, slot) = tree_with_pending("q");
    queue.open_tree(tree.clone()).await;

    assert!(!queue.abort().await);
    queue.schedule();
    while queue.in_flight().await.is_none() {
        tokio::task::yield_now().await;
    }
    assert_eq!(queue.in_flight().await, Some((tree.id(), slot)));
    assert!(queue.abort().await);
    drain(&queue).await;

    assert_eq!(content(&tree, slot).await.as_deref(), Some(CANCELLED_MARKER));
    assert!(queue.in_flight().await.is_none());
    assert_eq!(service.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_abort_settles_a_service_stalled_before_streaming() {
    let service = Arc::new(ScriptedService {
        stall: true,
        ..Default::default()
    });
    let queue = GenerationQueue::new(service.clone(), GenerationParams::default());
    let (tree, slot) = tree_with_pending("q");
    let (other_tree, other_slot) = tree_with_pending("next");
    queue.open_tree(tree.clone()).await;

    queue.schedule();
    while queue.in_flight().await.is_none() {
        tokio::task::yield_now().await;
    }
    assert!(queue.abort().await);
    tokio::time::timeout(Duration::from_secs(5), drain(&queue))
        .await
        .expect("aborted slot settles");

    assert_eq!(content(&tree, slot).await.as_deref(), Some(CANCELLED_MARKER));
    assert!(!queue.is_busy());
    assert!(queue.in_flight().await.is_none());

    // The queue serves later work once the stalled call is gone.
    queue.open_tree(other_tree.clone()).await;
    queue.schedule();
    while queue.in_flight().await.is_none() {
        tokio::task::yield_now().await;
    }
    assert_eq!(queue.in_flight().await, Some((other_tree.id(), other_slot)));
    assert!(queue.abort().await);
    drain(&queue).await;
    assert_eq!(service.seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_listeners_see_completions_then_idle() {
    let queue = GenerationQueue::new(Arc::new(EchoGenerationService::default()), GenerationParams::default());
    let recorder = Arc::new(RecordingListener::default());
    let listener: Arc<dyn CompletionListener> = recorder.clone();
    queue.add_listener(&listener).await;

    let (tree, slot) = tree_with_pending("q");
    queue.open_tree(tree.clone()).await;
    queue.schedule();
    drain(&queue).await;
    // The idle event is delivered right after waiters fire.
    while recorder.events.lock().unwrap().len() < 2 {
        tokio::task::yield_now().await;
    }

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            CompletionEvent::Completed {
                tree_id: tree.id(),
                message_id: slot,
                outcome: GenerationOutcome::Completed,
            },
            CompletionEvent::Idle,
        ]
    );
}

/// Submits one follow-up from inside the completion callback.
struct FollowUp {
    tree: TreeHandle,
    submitted: StdMutex<Option<MessageId>>,
}

#[async_trait]
impl CompletionListener for FollowUp {
    async fn on_generation_event(&self, event: &CompletionEvent) {
        if event.tree_id() != Some(self.tree.id()) {
            return;
        }
        if self.submitted.lock().unwrap().is_some() {
            return;
        }
        let mut tree = self.tree.lock().await;
        tree.add_message(MessageValue::user("and then?"));
        let id = tree.add_message(MessageValue::pending_assistant());
        *self.submitted.lock().unwrap() = Some(id);
    }
}

#[tokio::test]
async fn test_work_submitted_by_listener_is_found_in_same_drain() {
    let queue = GenerationQueue::new(Arc::new(EchoGenerationService::default()), GenerationParams::default());
    let (tree, _) = tree_with_pending("start");
    let follow_up = Arc::new(FollowUp {
        tree: tree.clone(),
        submitted: StdMutex::new(None),
    });
    let listener: Arc<dyn CompletionListener> = follow_up.clone();
    queue.add_listener(&listener).await;
    queue.open_tree(tree.clone()).await;

    queue.schedule();
    drain(&queue).await;

    let follow_slot = follow_up.submitted.lock().unwrap().unwrap();
    assert_eq!(content(&tree, follow_slot).await.as_deref(), Some("Echo: and then?"));
}

#[tokio::test]
async fn test_closed_trees_are_not_scanned() {
    let queue = GenerationQueue::new(Arc::new(EchoGenerationService::default()), GenerationParams::default());
    let (tree, slot) = tree_with_pending("q");
    queue.open_tree(tree.clone()).await;
    queue.close_tree(tree.id()).await;

    queue.schedule();
    drain(&queue).await;
    assert_eq!(content(&tree, slot).await, None);
}
