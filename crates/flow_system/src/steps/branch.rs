use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FAIL_OUTPUT, PASS_OUTPUT};
use crate::condition::{Condition, ConditionType};
use crate::error::Result;
use crate::graph::FlowStep;
use crate::step::{last_message_text, parse_data, StepContext, StepOutcome, StepType};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BranchData {
    pub condition_type: ConditionType,
    pub condition: String,
}

/// Follows `pass` or `fail` depending on the last message.
#[derive(Debug, Default)]
pub struct BranchStep;

impl BranchStep {
    pub const TYPE: &'static str = "branch";
}

#[async_trait]
impl StepType for BranchStep {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn default_data(&self) -> Value {
        serde_json::to_value(BranchData::default()).unwrap_or_default()
    }

    fn suspends_for_generation(&self) -> bool {
        false
    }

    fn outputs(&self) -> &'static [&'static str] {
        &[PASS_OUTPUT, FAIL_OUTPUT]
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let data: BranchData = parse_data(step)?;
        let text = last_message_text(&*ctx.tree.lock().await);
        let passed = Condition::new(data.condition_type, data.condition).evaluate(&text)?;
        let output = if passed { PASS_OUTPUT } else { FAIL_OUTPUT };
        tracing::debug!(step_id = %step.id, output, "Branch evaluated");
        Ok(StepOutcome::Next(output.to_string()))
    }
}
