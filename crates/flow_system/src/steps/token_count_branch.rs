use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FAIL_OUTPUT, PASS_OUTPUT};
use crate::error::Result;
use crate::graph::FlowStep;
use crate::step::{parse_data, StepContext, StepOutcome, StepType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenCountBranchData {
    /// Threshold at or above which `pass` is followed.
    pub token_count: u32,
}

impl Default for TokenCountBranchData {
    fn default() -> Self {
        Self { token_count: 500 }
    }
}

/// Branches on the estimated token size of the active path.
#[derive(Debug, Default)]
pub struct TokenCountBranchStep;

impl TokenCountBranchStep {
    pub const TYPE: &'static str = "token-count-branch";
}

#[async_trait]
impl StepType for TokenCountBranchStep {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn default_data(&self) -> Value {
        serde_json::to_value(TokenCountBranchData::default()).unwrap_or_default()
    }

    fn suspends_for_generation(&self) -> bool {
        false
    }

    fn outputs(&self) -> &'static [&'static str] {
        &[PASS_OUTPUT, FAIL_OUTPUT]
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let data: TokenCountBranchData = parse_data(step)?;
        let values = ctx.tree.lock().await.active_path_values();
        let estimate = ctx.services.token_counter.count_values(&values);
        let output = if estimate >= data.token_count {
            PASS_OUTPUT
        } else {
            FAIL_OUTPUT
        };
        tracing::debug!(
            step_id = %step.id,
            estimate,
            threshold = data.token_count,
            output,
            "Token count evaluated"
        );
        Ok(StepOutcome::Next(output.to_string()))
    }
}
