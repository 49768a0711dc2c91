use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::graph::FlowStep;
use crate::step::{parse_data, StepContext, StepOutcome, StepType};
use crate::turns::clear_turns;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClearHistoryData {
    /// First turn to clear, counted from the end (1 = most recent).
    pub clear_from: usize,
    pub clear_to: usize,
    /// Ignore `clear_to` and clear through the first turn.
    pub clear_to_beginning: bool,
}

impl Default for ClearHistoryData {
    fn default() -> Self {
        Self {
            clear_from: 1,
            clear_to: 1,
            clear_to_beginning: false,
        }
    }
}

/// Prunes a range of turns from the active path.
#[derive(Debug, Default)]
pub struct ClearHistoryStep;

impl ClearHistoryStep {
    pub const TYPE: &'static str = "clear-history";
}

#[async_trait]
impl StepType for ClearHistoryStep {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn default_data(&self) -> Value {
        serde_json::to_value(ClearHistoryData::default()).unwrap_or_default()
    }

    fn suspends_for_generation(&self) -> bool {
        false
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let data: ClearHistoryData = parse_data(step)?;
        let removed = clear_turns(
            &mut *ctx.tree.lock().await,
            data.clear_from,
            data.clear_to,
            data.clear_to_beginning,
        )?;
        tracing::info!(step_id = %step.id, removed, "Cleared history");
        Ok(StepOutcome::next())
    }
}
