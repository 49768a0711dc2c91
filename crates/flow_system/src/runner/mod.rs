//! Flow runner - drives a flow graph against one conversation tree
//!
//! - `state` - run status, phases and the bounded dispatch history
//! - `flow_runner` - dispatch loop and generation re-entry

mod flow_runner;
mod state;

pub use flow_runner::FlowRunner;
pub use state::{FanOutState, FlowStatus, RunPhase, RunnerView, StepDispatch};
