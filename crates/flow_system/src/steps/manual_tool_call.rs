use async_trait::async_trait;
use chat_core::MessageValue;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::agent_id;
use crate::error::{FlowError, Result};
use crate::graph::FlowStep;
use crate::step::{last_message_text, parse_data, submit_prompt, StepContext, StepOutcome, StepType};
use crate::tools::{ToolCallOutput, ToolCallRequest};

/// Replaced in `toolArgs` by the last message's content, JSON-escaped.
pub const LAST_RESPONSE_PLACEHOLDER: &str = "${LAST_RESPONSE}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManualToolCallData {
    pub tool_name: String,
    /// JSON object text, may contain the last-response placeholder.
    pub tool_args: String,
    /// Send the tool result as a prompt instead of recording it as a tool message.
    pub submit_result_as_prompt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// Calls a tool with user-authored arguments.
#[derive(Debug, Default)]
pub struct ManualToolCallStep;

impl ManualToolCallStep {
    pub const TYPE: &'static str = "manual-tool-call";
}

/// Fills the placeholder so the result stays valid inside a JSON string literal.
fn substitute_last_response(template: &str, last_response: &str) -> Result<String> {
    if !template.contains(LAST_RESPONSE_PLACEHOLDER) {
        return Ok(template.to_string());
    }
    let quoted = serde_json::to_string(last_response)?;
    let escaped = &quoted[1..quoted.len() - 1];
    Ok(template.replace(LAST_RESPONSE_PLACEHOLDER, escaped))
}

#[async_trait]
impl StepType for ManualToolCallStep {
    fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    fn default_data(&self) -> Value {
        serde_json::to_value(ManualToolCallData::default()).unwrap_or_default()
    }

    fn suspends_for_generation(&self) -> bool {
        true
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let data: ManualToolCallData = parse_data(step)?;
        let tool_name = data.tool_name.trim();
        if tool_name.is_empty() {
            return Err(FlowError::configuration(Self::TYPE, "no tool selected"));
        }
        let Some(tools) = ctx.services.tools.clone() else {
            return Err(FlowError::configuration(Self::TYPE, "no tool caller available"));
        };

        let last_response = last_message_text(&*ctx.tree.lock().await);
        let args_text = substitute_last_response(&data.tool_args, &last_response)?;
        let arguments: Value = if args_text.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&args_text).map_err(|e| {
                FlowError::configuration(Self::TYPE, format!("tool arguments are not valid JSON: {e}"))
            })?
        };

        let request = ToolCallRequest {
            name: tool_name.to_string(),
            arguments,
        };
        tracing::info!(step_id = %step.id, tool = %request.name, "Calling tool");
        let output = match tools.call_tool(&request).await {
            Ok(output) => output,
            Err(error) => {
                tracing::warn!(tool = %request.name, "Tool call failed: {}", error);
                ToolCallOutput::from(error)
            }
        };

        let mut tree = ctx.tree.lock().await;
        if data.submit_result_as_prompt {
            let slot = submit_prompt(&mut tree, output.content, agent_id(&data.agent));
            return Ok(StepOutcome::AwaitGeneration { slot });
        }
        tree.add_message(MessageValue::tool(output.content).with_metadata(json!({
            "toolName": request.name,
            "isError": output.is_error,
        })));
        Ok(StepOutcome::next())
    }
}
