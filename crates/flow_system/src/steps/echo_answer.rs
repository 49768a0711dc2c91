use async_trait::async_trait;
use chat_core::{ConversationTree, MessageId, MessageNode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::agent_id;
use crate::error::{FlowError, Result};
use crate::graph::FlowStep;
use crate::step::{parse_data, submit_prompt, StepContext, StepOutcome, StepType};
use crate::turns::group_segments;

/// What to remove from the conversation before the echo is submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteMode {
    #[default]
    None,
    /// The message the echoed answer replied to, and with it the answer.
    UserMessage,
    /// Only the echoed AI messages.
    AiTurn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EchoAnswerData {
    pub prefix: String,
    pub only_last_message: bool,
    pub delete_mode: DeleteMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

impl Default for EchoAnswerData {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            only_last_message: true,
            delete_mode: DeleteMode::None,
            agent: None,
        }
    }
}

/// Feeds the latest AI answer back in as a new prompt.
#[derive(Debug, Default)]
pub struct EchoAnswerStep;

impl EchoAnswerStep {
    pub const TYPE: &'static str = "echo-answer";
}

struct Echo {
    text: String,
    prompt_message: MessageId,
    ai_messages: Vec<MessageId>,
}

fn prepare_echo(tree: &ConversationTree, data: &EchoAnswerData) -> Result<Echo> {
    let path: Vec<&MessageNode> = tree.active_path().collect();
    let segments = group_segments(&path);
    let (Some(last), true) = (segments.last(), segments.len() >= 2) else {
        return Err(FlowError::step_failed(
            EchoAnswerStep::TYPE,
            "need a prompt followed by an answer to echo",
        ));
    };
    if !last.iter().all(|node| node.value.role.is_ai()) {
        return Err(FlowError::step_failed(
            EchoAnswerStep::TYPE,
            "the conversation does not end with an answer",
        ));
    }
    let previous = &segments[segments.len() - 2];

    let body = if data.only_last_message {
        last.last()
            .map(|node| node.value.text().to_string())
            .unwrap_or_default()
    } else {
        last.iter()
            .map(|node| node.value.text())
            .collect::<Vec<_>>()
            .join("\n\n")
    };
    let prefix = data.prefix.trim();
    let text = if prefix.is_empty() {
        body
    } else {
        format!("{prefix}\n\n{body}")
    };

    Ok(Echo {
        text,
        prompt_message: previous[previous.len() - 1].id,
        ai_messages: last.iter().map(|node| node.id).collect(),
    })
}

#[async_trait]
impl StepType for EchoAnswerStep {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn default_data(&self) -> Value {
        serde_json::to_value(EchoAnswerData::default()).unwrap_or_default()
    }

    fn suspends_for_generation(&self) -> bool {
        true
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let data: EchoAnswerData = parse_data(step)?;
        let mut tree = ctx.tree.lock().await;
        let echo = prepare_echo(&tree, &data)?;

        match data.delete_mode {
            DeleteMode::None => {}
            DeleteMode::UserMessage => {
                tree.delete_message(echo.prompt_message);
            }
            DeleteMode::AiTurn => {
                for id in echo.ai_messages.iter().rev() {
                    tree.delete_message(*id);
                }
            }
        }

        let slot = submit_prompt(&mut tree, echo.text, agent_id(&data.agent));
        tracing::debug!(
            step_id = %step.id,
            message_id = %slot,
            delete_mode = ?data.delete_mode,
            "Echoed answer as prompt"
        );
        Ok(StepOutcome::AwaitGeneration { slot })
    }
}
