//! Built-in step types

use std::sync::Arc;

use crate::step::StepType;

mod branch;
mod clear_history;
mod conditional_stop;
mod consolidator;
mod echo_answer;
mod manual_tool_call;
mod multi_prompt;
mod simple_prompt;
mod token_count_branch;

pub use branch::{BranchData, BranchStep};
pub use clear_history::{ClearHistoryData, ClearHistoryStep};
pub use conditional_stop::{ConditionalStopData, ConditionalStopStep, StopMode};
pub use consolidator::{build_consolidation_prompt, ConsolidatorData, ConsolidatorStep};
pub use echo_answer::{DeleteMode, EchoAnswerData, EchoAnswerStep};
pub use manual_tool_call::{ManualToolCallData, ManualToolCallStep, LAST_RESPONSE_PLACEHOLDER};
pub use multi_prompt::{MultiPromptData, MultiPromptStep};
pub use simple_prompt::{SimplePromptData, SimplePromptStep};
pub use token_count_branch::{TokenCountBranchData, TokenCountBranchStep};

/// Outputs of the two-way branching steps.
pub const PASS_OUTPUT: &str = "pass";
pub const FAIL_OUTPUT: &str = "fail";

pub fn builtin_steps() -> Vec<Arc<dyn StepType>> {
    vec![
        Arc::new(SimplePromptStep),
        Arc::new(MultiPromptStep),
        Arc::new(ConsolidatorStep),
        Arc::new(EchoAnswerStep),
        Arc::new(ClearHistoryStep),
        Arc::new(BranchStep),
        Arc::new(ConditionalStopStep),
        Arc::new(ManualToolCallStep),
        Arc::new(TokenCountBranchStep),
    ]
}

/// Blank agent ids mean "use the default agent".
fn agent_id(agent: &Option<String>) -> Option<String> {
    agent
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
}
