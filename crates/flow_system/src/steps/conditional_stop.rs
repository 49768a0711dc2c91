use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{Condition, ConditionType};
use crate::error::Result;
use crate::graph::FlowStep;
use crate::step::{last_message_text, parse_data, StepContext, StepOutcome, StepType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopMode {
    #[default]
    StopOnMatch,
    MustMatchToContinue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionalStopData {
    pub condition_type: ConditionType,
    pub condition: String,
    pub on_match: StopMode,
}

/// Halts the flow when the last message does (or does not) satisfy a condition.
#[derive(Debug, Default)]
pub struct ConditionalStopStep;

impl ConditionalStopStep {
    pub const TYPE: &'static str = "conditional-stop";
}

#[async_trait]
impl StepType for ConditionalStopStep {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn default_data(&self) -> Value {
        serde_json::to_value(ConditionalStopData::default()).unwrap_or_default()
    }

    fn suspends_for_generation(&self) -> bool {
        false
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let data: ConditionalStopData = parse_data(step)?;
        let text = last_message_text(&*ctx.tree.lock().await);
        let condition = Condition::new(data.condition_type, data.condition);
        let matched = condition.evaluate(&text)?;

        let outcome = match (data.on_match, matched) {
            (StopMode::StopOnMatch, true) => StepOutcome::Stop(format!(
                "Stopped: last message matched \"{}\"",
                condition.pattern
            )),
            (StopMode::MustMatchToContinue, false) => StepOutcome::Stop(format!(
                "Stopped: last message did not match \"{}\"",
                condition.pattern
            )),
            _ => StepOutcome::next(),
        };
        Ok(outcome)
    }
}
