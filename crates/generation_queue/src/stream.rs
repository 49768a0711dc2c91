use chat_core::{MessageId, TreeHandle};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::listener::GenerationOutcome;
use crate::service::{GenerationChunk, GenerationStream};

pub const CANCELLED_MARKER: &str = "[Generation cancelled]";
pub const ERROR_MARKER_PREFIX: &str = "[Generation error: ";

pub(crate) fn error_marker(message: &str) -> String {
    format!("{ERROR_MARKER_PREFIX}{message}]")
}

/// Streams chunks into the slot until the stream ends, fails or is cancelled.
pub(crate) async fn consume_generation_stream(
    mut stream: GenerationStream,
    tree: &TreeHandle,
    message_id: MessageId,
    cancel: &CancellationToken,
) -> GenerationOutcome {
    let mut received = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(tree_id = %tree.id(), message_id = %message_id, "Generation cancelled");
                write_marker(tree, message_id, CANCELLED_MARKER).await;
                return GenerationOutcome::Cancelled;
            }
            next = stream.next() => next,
        };

        match next {
            None | Some(Ok(GenerationChunk::Done)) => {
                tracing::debug!(
                    tree_id = %tree.id(),
                    message_id = %message_id,
                    chars = received,
                    "Generation stream completed"
                );
                return GenerationOutcome::Completed;
            }
            Some(Ok(GenerationChunk::Token(token))) => {
                received += token.len();
                if !tree.lock().await.append_content(message_id, &token) {
                    tracing::warn!(
                        tree_id = %tree.id(),
                        message_id = %message_id,
                        "Pending message vanished while streaming"
                    );
                    return GenerationOutcome::Abandoned;
                }
            }
            Some(Err(error)) => {
                tracing::warn!(tree_id = %tree.id(), message_id = %message_id, "Stream error: {}", error);
                write_marker(tree, message_id, &error_marker(&error.to_string())).await;
                return GenerationOutcome::Failed(error.to_string());
            }
        }
    }
}

/// Appends a visible marker, separated from partial output by a blank line.
pub(crate) async fn write_marker(tree: &TreeHandle, message_id: MessageId, marker: &str) -> bool {
    let mut guard = tree.lock().await;
    let has_output = guard
        .message(message_id)
        .and_then(|m| m.value.content.as_deref())
        .is_some_and(|content| !content.is_empty());
    let text = if has_output {
        format!("\n\n{marker}")
    } else {
        marker.to_string()
    };
    guard.append_content(message_id, &text)
}
