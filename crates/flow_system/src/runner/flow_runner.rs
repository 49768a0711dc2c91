use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{Config, MessageId, MessageValue, TreeHandle, TreeId};
use generation_queue::{CompletionEvent, CompletionListener, GenerationOutcome, GenerationQueue};
use tokio::sync::Mutex;

use super::state::{FanOutState, FlowStatus, RunPhase, RunnerState, RunnerView};
use crate::error::{FlowError, Result};
use crate::graph::{FlowGraph, StepId, DEFAULT_OUTPUT};
use crate::registry::StepRegistry;
use crate::step::{StepContext, StepOutcome, StepServices};

/// Executes flow graphs against one conversation tree.
///
/// Steps run back to back until one submits a prompt. The runner then waits
/// for the generation queue to report that the prompt was answered and carries
/// on from there. The runner state stays locked for a whole chain of steps, so
/// a completion is only handled once the submitting step has been recorded.
pub struct FlowRunner {
    tree: TreeHandle,
    queue: Arc<GenerationQueue>,
    registry: Arc<StepRegistry>,
    services: StepServices,
    max_dispatch_steps: usize,
    state: Mutex<RunnerState>,
}

impl FlowRunner {
    /// Creates a runner for `tree`, opens the tree on the queue and subscribes
    /// to its completions.
    pub async fn new(
        tree: TreeHandle,
        queue: Arc<GenerationQueue>,
        registry: Arc<StepRegistry>,
        services: StepServices,
        config: &Config,
    ) -> Arc<Self> {
        let runner = Arc::new(Self {
            tree: tree.clone(),
            queue: Arc::clone(&queue),
            registry,
            services,
            max_dispatch_steps: config.max_dispatch_steps.max(1),
            state: Mutex::new(RunnerState::default()),
        });
        queue.open_tree(tree).await;
        let listener: Arc<dyn CompletionListener> = runner.clone();
        queue.add_listener(&listener).await;
        runner
    }

    pub fn tree(&self) -> &TreeHandle {
        &self.tree
    }

    pub async fn status(&self) -> FlowStatus {
        self.state.lock().await.status.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.status.is_running()
    }

    pub async fn view(&self) -> RunnerView {
        self.state.lock().await.view()
    }

    /// Starts `graph` at its unique start step and runs until the first
    /// suspension or the end of the flow.
    ///
    /// Errors that halt the flow are also returned here.
    pub async fn start(&self, graph: FlowGraph) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.status.is_running() {
            return Err(FlowError::AlreadyRunning);
        }

        let graph = Arc::new(graph);
        state.begin(Arc::clone(&graph));
        let start = match graph.start_step() {
            Ok(step) => step.id.clone(),
            Err(error) => return Err(Self::fail(&mut state, error)),
        };
        tracing::info!(
            tree_id = %self.tree.id(),
            flow = %graph.name,
            start_step = %start,
            "Flow started"
        );
        self.dispatch(&mut state, start).await
    }

    /// Halts a running flow. Has no effect on a flow that is not running.
    pub async fn stop(&self, reason: impl Into<String>) {
        let mut state = self.state.lock().await;
        if !state.status.is_running() {
            return;
        }
        let reason = reason.into();
        tracing::info!(tree_id = %self.tree.id(), reason = %reason, "Flow stopped");
        state.halt(reason);
    }

    /// Runs steps starting at `first` until one suspends, the flow ends, or
    /// something fails.
    async fn dispatch(&self, state: &mut RunnerState, first: StepId) -> Result<()> {
        let Some(graph) = state.graph.clone() else {
            return Err(Self::fail(state, FlowError::NoStartStep));
        };

        let mut step_id = first;
        for _ in 0..self.max_dispatch_steps {
            let Some(step) = graph.step(&step_id) else {
                return Err(Self::fail(state, FlowError::StepNotFound(step_id)));
            };
            let Some(step_type) = self.registry.get(&step.step_type) else {
                return Err(Self::fail(
                    state,
                    FlowError::UnknownStepType(step.step_type.clone()),
                ));
            };

            state.record_dispatch(step.id.clone(), &step.step_type);
            tracing::debug!(
                tree_id = %self.tree.id(),
                step_id = %step.id,
                step_type = %step.step_type,
                "Dispatching step"
            );

            let ctx = StepContext::new(&self.tree, &graph, &self.services);
            let outcome = match step_type.execute(step, &ctx).await {
                Ok(outcome) => outcome,
                Err(error) => return Err(Self::fail(state, error)),
            };

            let output = match outcome {
                StepOutcome::Next(output) => output,
                StepOutcome::Stop(reason) => {
                    tracing::info!(step_id = %step.id, reason = %reason, "Flow stopped by step");
                    state.halt(reason);
                    return Ok(());
                }
                StepOutcome::AwaitGeneration { .. } | StepOutcome::FanOut { .. }
                    if !step_type.suspends_for_generation() =>
                {
                    return Err(Self::fail(
                        state,
                        FlowError::UnexpectedSuspension(step.step_type.clone()),
                    ));
                }
                StepOutcome::AwaitGeneration { slot } => {
                    state.phase = RunPhase::AwaitingGeneration;
                    state.awaiting = Some(slot);
                    self.queue.schedule();
                    return Ok(());
                }
                StepOutcome::FanOut {
                    count,
                    base_message,
                } => {
                    let agent = self
                        .tree
                        .lock()
                        .await
                        .message(base_message)
                        .and_then(|m| m.value.agent.clone());
                    state.phase = RunPhase::AwaitingFanOut;
                    state.awaiting = Some(base_message);
                    state.fan_out = Some(FanOutState {
                        step_id: step.id.clone(),
                        target_count: count,
                        done_count: 0,
                        branch_message: base_message,
                        agent,
                    });
                    self.queue.schedule();
                    return Ok(());
                }
            };

            match graph.next_step(&step.id, &output) {
                Ok(Some(next)) => step_id = next.id.clone(),
                Ok(None) => {
                    Self::finish_at(state, &step.id, &output);
                    return Ok(());
                }
                Err(error) => return Err(Self::fail(state, error)),
            }
        }

        Err(Self::fail(
            state,
            FlowError::DispatchLimit(self.max_dispatch_steps),
        ))
    }

    /// Continues after the step that was waiting on generation.
    async fn advance(&self, state: &mut RunnerState, from: StepId) {
        let Some(graph) = state.graph.clone() else {
            return;
        };
        match graph.next_step(&from, DEFAULT_OUTPUT) {
            Ok(Some(next)) => {
                let next = next.id.clone();
                // Failures are recorded in the state by `dispatch`.
                let _ = self.dispatch(state, next).await;
            }
            Ok(None) => Self::finish_at(state, &from, DEFAULT_OUTPUT),
            Err(error) => {
                Self::fail(state, error);
            }
        }
    }

    async fn on_completion(&self, message_id: MessageId, outcome: &GenerationOutcome) {
        let mut state = self.state.lock().await;
        if !state.status.is_running() {
            return;
        }
        if state.awaiting != Some(message_id) {
            tracing::debug!(
                tree_id = %self.tree.id(),
                message_id = %message_id,
                "Ignoring completion of a slot this run is not waiting on"
            );
            return;
        }
        state.awaiting = None;
        tracing::debug!(
            tree_id = %self.tree.id(),
            message_id = %message_id,
            outcome = ?outcome,
            phase = ?state.phase,
            "Generation completed"
        );

        match state.phase {
            RunPhase::Dispatched => {}
            RunPhase::AwaitingGeneration => {
                let Some(current) = state.current_step.clone() else {
                    return;
                };
                self.advance(&mut state, current).await;
            }
            RunPhase::AwaitingFanOut => {
                let Some(fan_out) = state.fan_out.as_mut() else {
                    return;
                };
                fan_out.done_count += 1;
                if fan_out.done_count < fan_out.target_count {
                    let base = fan_out.branch_message;
                    let agent = fan_out.agent.clone();
                    let added = self
                        .tree
                        .lock()
                        .await
                        .add_alternative(base, MessageValue::pending_assistant().with_agent(agent));
                    match added {
                        Some(slot) => {
                            state.awaiting = Some(slot);
                            self.queue.schedule();
                        }
                        None => {
                            Self::fail(
                                &mut state,
                                FlowError::Tree(format!("fan-out answer {base} no longer exists")),
                            );
                        }
                    }
                    return;
                }
                let step_id = fan_out.step_id.clone();
                state.fan_out = None;
                self.advance(&mut state, step_id).await;
            }
        }
    }

    fn finish_at(state: &mut RunnerState, step_id: &StepId, output: &str) {
        let reason = format!("Flow finished: step {step_id} has no {output} connection");
        tracing::info!(step_id = %step_id, "Flow finished");
        state.finish(reason);
    }

    /// Halts with `error` as the reason and hands the error back.
    fn fail(state: &mut RunnerState, error: FlowError) -> FlowError {
        tracing::warn!(step_id = ?state.current_step, "Flow halted: {}", error);
        state.halt(error.to_string());
        error
    }

    fn owns(&self, tree_id: TreeId) -> bool {
        self.tree.id() == tree_id
    }
}

#[async_trait]
impl CompletionListener for FlowRunner {
    async fn on_generation_event(&self, event: &CompletionEvent) {
        if let CompletionEvent::Completed {
            tree_id,
            message_id,
            outcome,
        } = event
        {
            if self.owns(*tree_id) {
                self.on_completion(*message_id, outcome).await;
            }
        }
    }
}
