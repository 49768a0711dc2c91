//! Runner states

use std::collections::VecDeque;
use std::sync::Arc;

use chat_core::MessageId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::{FlowGraph, StepId};

const MAX_HISTORY: usize = 200;

/// Lifecycle of a runner: `Idle -> Running -> (Idle | Halted)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum FlowStatus {
    #[default]
    Idle,
    Running,
    /// Stopped early: by request, by a stop step, or by an error.
    Halted {
        reason: String,
        at: DateTime<Utc>,
    },
}

impl FlowStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// What a running flow is doing at its current step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Executing steps.
    #[default]
    Dispatched,
    /// Waiting for the answer to a submitted prompt.
    AwaitingGeneration,
    /// Collecting sibling answers for a fan-out step.
    AwaitingFanOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutState {
    pub step_id: StepId,
    pub target_count: usize,
    pub done_count: usize,
    /// The first answer slot; further answers become its siblings.
    pub branch_message: MessageId,
    pub agent: Option<String>,
}

/// One step dispatch, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDispatch {
    pub step_id: StepId,
    pub step_type: String,
    pub at: DateTime<Utc>,
}

/// Point-in-time copy of a runner's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerView {
    pub status: FlowStatus,
    pub phase: RunPhase,
    pub current_step: Option<StepId>,
    pub fan_out: Option<FanOutState>,
    /// Answer slot whose completion moves the flow on.
    pub awaiting: Option<MessageId>,
    pub last_reason: Option<String>,
    pub history: Vec<StepDispatch>,
}

#[derive(Debug, Default)]
pub(crate) struct RunnerState {
    pub graph: Option<Arc<FlowGraph>>,
    pub status: FlowStatus,
    pub phase: RunPhase,
    pub current_step: Option<StepId>,
    pub fan_out: Option<FanOutState>,
    pub awaiting: Option<MessageId>,
    pub last_reason: Option<String>,
    history: VecDeque<StepDispatch>,
}

impl RunnerState {
    pub fn begin(&mut self, graph: Arc<FlowGraph>) {
        self.graph = Some(graph);
        self.status = FlowStatus::Running;
        self.phase = RunPhase::Dispatched;
        self.current_step = None;
        self.fan_out = None;
        self.awaiting = None;
        self.last_reason = None;
        self.history.clear();
    }

    pub fn record_dispatch(&mut self, step_id: StepId, step_type: &str) {
        self.current_step = Some(step_id.clone());
        self.phase = RunPhase::Dispatched;
        self.awaiting = None;
        self.history.push_back(StepDispatch {
            step_id,
            step_type: step_type.to_string(),
            at: Utc::now(),
        });
        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    /// Normal end of a run: no next step.
    pub fn finish(&mut self, reason: String) {
        self.settle(FlowStatus::Idle, reason);
    }

    pub fn halt(&mut self, reason: String) {
        let status = FlowStatus::Halted {
            reason: reason.clone(),
            at: Utc::now(),
        };
        self.settle(status, reason);
    }

    fn settle(&mut self, status: FlowStatus, reason: String) {
        self.status = status;
        self.phase = RunPhase::Dispatched;
        self.fan_out = None;
        self.awaiting = None;
        self.last_reason = Some(reason);
    }

    pub fn view(&self) -> RunnerView {
        RunnerView {
            status: self.status.clone(),
            phase: self.phase,
            current_step: self.current_step.clone(),
            fan_out: self.fan_out.clone(),
            awaiting: self.awaiting,
            last_reason: self.last_reason.clone(),
            history: self.history.iter().cloned().collect(),
        }
    }
}
