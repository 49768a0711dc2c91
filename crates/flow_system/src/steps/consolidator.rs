use async_trait::async_trait;
use chat_core::{ConversationTree, MessageNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::agent_id;
use crate::error::{FlowError, Result};
use crate::graph::FlowStep;
use crate::step::{parse_data, submit_prompt, StepContext, StepOutcome, StepType};
use crate::turns::clear_turns;

const LEAF_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsolidatorData {
    pub pre_text: String,
    pub post_text: String,
    /// Quote only the final message of each leaf path.
    pub only_last_answer: bool,
    /// Prune turns before submitting the consolidated prompt.
    pub clear_history: bool,
    pub clear_from: usize,
    pub clear_to: usize,
    pub clear_to_beginning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Default for ConsolidatorData {
    fn default() -> Self {
        Self {
            pre_text: String::new(),
            post_text: String::new(),
            only_last_answer: false,
            clear_history: false,
            clear_from: 1,
            clear_to: 1,
            clear_to_beginning: false,
            agent: None,
        }
    }
}

/// Gathers every alternative below the nearest branch point into one prompt.
#[derive(Debug, Default)]
pub struct ConsolidatorStep;

impl ConsolidatorStep {
    pub const TYPE: &'static str = "consolidator";
}

/// Builds the consolidation prompt for the last branch point on the active path.
pub fn build_consolidation_prompt(
    tree: &ConversationTree,
    data: &ConsolidatorData,
) -> Result<String> {
    let branch_point = tree
        .active_path()
        .filter(|node| node.is_branch_point())
        .last()
        .ok_or_else(|| {
            FlowError::step_failed(
                ConsolidatorStep::TYPE,
                "no message with multiple alternatives on the active path",
            )
        })?;
    let Some(answers) = branch_point.answers.as_ref() else {
        return Err(FlowError::Tree("branch point lost its answers".into()));
    };

    let mut blocks = Vec::with_capacity(answers.len());
    for (index, alternative) in answers.messages().iter().enumerate() {
        let paths = tree.leaf_paths_under(alternative.id).unwrap_or_default();
        let body = paths
            .iter()
            .map(|path| format_path(path, data.only_last_answer))
            .collect::<Vec<_>>()
            .join(LEAF_SEPARATOR);
        blocks.push(format!("ALTERNATIVE {}:\n{}", index + 1, body));
    }

    let alternatives = blocks.join("\n\n");
    let sections: Vec<&str> = [data.pre_text.trim(), alternatives.as_str(), data.post_text.trim()]
        .into_iter()
        .filter(|section| !section.is_empty())
        .collect();
    Ok(sections.join("\n\n"))
}

fn format_path(path: &[&MessageNode], only_last: bool) -> String {
    if only_last {
        return path
            .last()
            .map(|node| node.value.text().to_string())
            .unwrap_or_default();
    }
    path.iter()
        .map(|node| format!("{}: {}", node.value.role.label(), node.value.text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl StepType for ConsolidatorStep {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn default_data(&self) -> Value {
        serde_json::to_value(ConsolidatorData::default()).unwrap_or_default()
    }

    fn suspends_for_generation(&self) -> bool {
        true
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let data: ConsolidatorData = parse_data(step)?;
        let mut tree = ctx.tree.lock().await;
        let prompt = build_consolidation_prompt(&tree, &data)?;
        if data.clear_history {
            clear_turns(
                &mut tree,
                data.clear_from,
                data.clear_to,
                data.clear_to_beginning,
            )?;
        }
        let slot = submit_prompt(&mut tree, prompt, agent_id(&data.agent));
        tracing::debug!(step_id = %step.id, message_id = %slot, "Submitted consolidation prompt");
        Ok(StepOutcome::AwaitGeneration { slot })
    }
}
