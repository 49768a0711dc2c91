use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::agent_id;
use crate::error::{FlowError, Result};
use crate::graph::FlowStep;
use crate::step::{parse_data, submit_prompt, StepContext, StepOutcome, StepType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MultiPromptData {
    pub prompt: String,
    /// How many sibling answers to collect.
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Default for MultiPromptData {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            count: 2,
            agent: None,
        }
    }
}

/// Submits one prompt and has the runner collect `count` alternative answers
/// to it before moving on.
#[derive(Debug, Default)]
pub struct MultiPromptStep;

impl MultiPromptStep {
    pub const TYPE: &'static str = "multi-prompt";
}

#[async_trait]
impl StepType for MultiPromptStep {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn default_data(&self) -> Value {
        serde_json::to_value(MultiPromptData::default()).unwrap_or_default()
    }

    fn suspends_for_generation(&self) -> bool {
        true
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let data: MultiPromptData = parse_data(step)?;
        if data.prompt.trim().is_empty() {
            return Err(FlowError::configuration(Self::TYPE, "prompt is empty"));
        }
        if data.count == 0 {
            return Err(FlowError::configuration(Self::TYPE, "count must be at least 1"));
        }
        let base_message =
            submit_prompt(&mut *ctx.tree.lock().await, data.prompt, agent_id(&data.agent));
        tracing::debug!(
            step_id = %step.id,
            message_id = %base_message,
            count = data.count,
            "Submitted fan-out prompt"
        );
        Ok(StepOutcome::FanOut {
            count: data.count,
            base_message,
        })
    }
}
