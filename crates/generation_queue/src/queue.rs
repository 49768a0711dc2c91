//! Single-flight generation queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chat_core::{MessageId, TreeHandle, TreeId};
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use crate::listener::{CompletionEvent, CompletionListener, GenerationOutcome};
use crate::service::{GenerationError, GenerationParams, GenerationRequest, GenerationService};
use crate::stream::{consume_generation_stream, error_marker, write_marker, CANCELLED_MARKER};

struct Job {
    tree: TreeHandle,
    message_id: MessageId,
    request: GenerationRequest,
}

struct InFlight {
    tree_id: TreeId,
    message_id: MessageId,
    cancel: CancellationToken,
}

/// Serializes generation across every open tree.
///
/// `schedule` starts a drain task unless one is already running. The drain claims
/// the first pending slot (trees in registration order, pre-order within a
/// tree), streams it, notifies listeners, and scans again until nothing is
/// pending.
pub struct GenerationQueue {
    service: Arc<dyn GenerationService>,
    params: GenerationParams,
    trees: Mutex<Vec<TreeHandle>>,
    listeners: Mutex<Vec<Weak<dyn CompletionListener>>>,
    idle_waiters: Mutex<Vec<oneshot::Sender<()>>>,
    in_flight: Mutex<Option<InFlight>>,
    busy: AtomicBool,
    rescan: AtomicBool,
}

impl GenerationQueue {
    pub fn new(service: Arc<dyn GenerationService>, params: GenerationParams) -> Arc<Self> {
        Arc::new(Self {
            service,
            params,
            trees: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            idle_waiters: Mutex::new(Vec::new()),
            in_flight: Mutex::new(None),
            busy: AtomicBool::new(false),
            rescan: AtomicBool::new(false),
        })
    }

    /// Makes a tree visible to the scan. Opening the same tree twice is a no-op.
    pub async fn open_tree(&self, tree: TreeHandle) {
        let mut trees = self.trees.lock().await;
        if trees.iter().all(|t| t.id() != tree.id()) {
            tracing::debug!(tree_id = %tree.id(), "GenerationQueue: tree opened");
            trees.push(tree);
        }
    }

    pub async fn close_tree(&self, tree_id: TreeId) {
        self.trees.lock().await.retain(|t| t.id() != tree_id);
    }

    /// Registers a listener for every completion event. Held weakly.
    pub async fn add_listener(&self, listener: &Arc<dyn CompletionListener>) {
        self.listeners.lock().await.push(Arc::downgrade(listener));
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// The slot currently being generated, if any.
    pub async fn in_flight(&self) -> Option<(TreeId, MessageId)> {
        self.in_flight
            .lock()
            .await
            .as_ref()
            .map(|job| (job.tree_id, job.message_id))
    }

    /// Resolves once the queue has drained. Fires immediately when idle.
    pub async fn when_idle(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self.idle_waiters.lock().await;
        if self.is_busy() {
            waiters.push(tx);
        } else {
            let _ = tx.send(());
        }
        rx
    }

    /// Cancels the in-flight generation. Returns false when nothing is running.
    pub async fn abort(&self) -> bool {
        match self.in_flight.lock().await.as_ref() {
            Some(job) => {
                tracing::info!(
                    tree_id = %job.tree_id,
                    message_id = %job.message_id,
                    "GenerationQueue: aborting in-flight generation"
                );
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Starts draining pending work. A no-op while a drain is running; the
    /// running drain re-scans before it stops.
    pub fn schedule(self: &Arc<Self>) {
        self.rescan.store(true, Ordering::SeqCst);
        if self.busy.swap(true, Ordering::SeqCst) {
            tracing::trace!("GenerationQueue: already draining");
            return;
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move { queue.drain().await });
    }

    async fn drain(self: Arc<Self>) {
        loop {
            self.rescan.store(false, Ordering::SeqCst);

            if let Some(job) = self.claim_next().await {
                let outcome = self.run(&job).await;
                tracing::debug!(
                    tree_id = %job.tree.id(),
                    message_id = %job.message_id,
                    outcome = ?outcome,
                    "GenerationQueue: slot settled"
                );
                self.notify(CompletionEvent::Completed {
                    tree_id: job.tree.id(),
                    message_id: job.message_id,
                    outcome,
                })
                .await;
                continue;
            }

            self.busy.store(false, Ordering::SeqCst);
            // Work scheduled between the empty scan and clearing `busy` would
            // otherwise be stranded.
            if self.rescan.load(Ordering::SeqCst) && !self.busy.swap(true, Ordering::SeqCst) {
                continue;
            }
            break;
        }

        {
            let mut waiters = self.idle_waiters.lock().await;
            if self.is_busy() {
                // A newer drain owns the waiters now.
                return;
            }
            for waiter in waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
        tracing::debug!("GenerationQueue: drained");
        self.notify(CompletionEvent::Idle).await;
    }

    /// Finds the next pending slot and marks it in flight by giving it content.
    async fn claim_next(&self) -> Option<Job> {
        let trees = self.trees.lock().await.clone();
        for tree in trees {
            let mut guard = tree.lock().await;
            let Some(message_id) = guard.find_first_pending_assistant_message() else {
                continue;
            };
            let history = guard.history_before(message_id).unwrap_or_default();
            let agent = guard
                .message(message_id)
                .and_then(|m| m.value.agent.clone());
            guard.set_content(message_id, Some(String::new()));
            drop(guard);

            tracing::info!(
                tree_id = %tree.id(),
                message_id = %message_id,
                history_len = history.len(),
                "GenerationQueue: generating"
            );
            let request = GenerationRequest {
                tree_id: tree.id(),
                message_id,
                history,
                agent,
                params: self.params.clone(),
            };
            return Some(Job {
                tree,
                message_id,
                request,
            });
        }
        None
    }

    async fn run(&self, job: &Job) -> GenerationOutcome {
        let cancel = CancellationToken::new();
        *self.in_flight.lock().await = Some(InFlight {
            tree_id: job.tree.id(),
            message_id: job.message_id,
            cancel: cancel.clone(),
        });

        // A service that stalls before handing back its stream still yields to abort.
        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GenerationError::Cancelled),
            started = self.service.generate(job.request.clone(), cancel.clone()) => started,
        };

        let outcome = match started {
            Ok(stream) => consume_generation_stream(stream, &job.tree, job.message_id, &cancel).await,
            Err(GenerationError::Cancelled) => {
                tracing::info!(
                    tree_id = %job.tree.id(),
                    message_id = %job.message_id,
                    "Generation cancelled before streaming"
                );
                write_marker(&job.tree, job.message_id, CANCELLED_MARKER).await;
                GenerationOutcome::Cancelled
            }
            Err(error) => {
                tracing::warn!(
                    tree_id = %job.tree.id(),
                    message_id = %job.message_id,
                    "Generation request failed: {}",
                    error
                );
                write_marker(&job.tree, job.message_id, &error_marker(&error.to_string())).await;
                GenerationOutcome::Failed(error.to_string())
            }
        };

        *self.in_flight.lock().await = None;
        outcome
    }

    async fn notify(&self, event: CompletionEvent) {
        let listeners: Vec<Arc<dyn CompletionListener>> = {
            let mut guard = self.listeners.lock().await;
            guard.retain(|listener| listener.strong_count() > 0);
            guard.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener.on_generation_event(&event).await;
        }
    }
}
