//! flow_system - scripted multi-step interactions over a conversation tree
//!
//! A [`FlowGraph`] is a set of typed steps joined by named-output connections.
//! The [`FlowRunner`] walks the graph, letting each step mutate the tree and
//! pausing whenever a step hands work to the generation queue.

pub mod condition;
pub mod error;
pub mod graph;
pub mod manager;
pub mod registry;
pub mod runner;
pub mod step;
pub mod steps;
pub mod storage;
pub mod tools;
pub mod turns;

pub use condition::{Condition, ConditionType};
pub use error::{FlowError, Result};
pub use graph::{Connection, FlowGraph, FlowId, FlowStep, StepId, DEFAULT_OUTPUT};
pub use manager::FlowManager;
pub use registry::StepRegistry;
pub use runner::{FanOutState, FlowRunner, FlowStatus, RunPhase, RunnerView, StepDispatch};
pub use step::{StepContext, StepOutcome, StepServices, StepType};
pub use storage::{FlowStorage, JsonFileStorage};
pub use tools::{ToolCallError, ToolCallOutput, ToolCallRequest, ToolCaller};
