use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::agent_id;
use crate::error::{FlowError, Result};
use crate::graph::FlowStep;
use crate::step::{parse_data, submit_prompt, StepContext, StepOutcome, StepType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimplePromptData {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Submits a fixed prompt and waits for the answer.
#[derive(Debug, Default)]
pub struct SimplePromptStep;

impl SimplePromptStep {
    pub const TYPE: &'static str = "simple-prompt";
}

#[async_trait]
impl StepType for SimplePromptStep {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn default_data(&self) -> Value {
        serde_json::to_value(SimplePromptData::default()).unwrap_or_default()
    }

    fn suspends_for_generation(&self) -> bool {
        true
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let data: SimplePromptData = parse_data(step)?;
        if data.prompt.trim().is_empty() {
            return Err(FlowError::configuration(Self::TYPE, "prompt is empty"));
        }
        let slot = submit_prompt(&mut *ctx.tree.lock().await, data.prompt, agent_id(&data.agent));
        tracing::debug!(step_id = %step.id, message_id = %slot, "Submitted prompt");
        Ok(StepOutcome::AwaitGeneration { slot })
    }
}
