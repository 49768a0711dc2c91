//! The step-type protocol

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{
    ConversationTree, HeuristicTokenCounter, MessageId, MessageValue, SharedTokenCounter,
    TreeHandle,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{FlowError, Result};
use crate::graph::{FlowGraph, FlowStep, StepId, DEFAULT_OUTPUT};
use crate::tools::ToolCaller;

/// What the runner should do after a step executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Follow the named output.
    Next(String),
    /// A prompt was submitted; continue once `slot` has been answered.
    AwaitGeneration { slot: MessageId },
    /// A prompt was submitted whose answer slot should be filled `count` times
    /// as sibling alternatives of `base_message`.
    FanOut { count: usize, base_message: MessageId },
    /// Halt the flow.
    Stop(String),
}

impl StepOutcome {
    /// Follow the `default` output.
    pub fn next() -> Self {
        Self::Next(DEFAULT_OUTPUT.to_string())
    }
}

/// Collaborators available to steps.
#[derive(Clone)]
pub struct StepServices {
    pub tools: Option<Arc<dyn ToolCaller>>,
    pub token_counter: SharedTokenCounter,
}

impl StepServices {
    pub fn with_tools(mut self, tools: Arc<dyn ToolCaller>) -> Self {
        self.tools = Some(tools);
        self
    }
}

impl Default for StepServices {
    fn default() -> Self {
        Self {
            tools: None,
            token_counter: Arc::new(HeuristicTokenCounter::default()),
        }
    }
}

/// What a step sees while it executes.
pub struct StepContext<'a> {
    pub tree: &'a TreeHandle,
    pub graph: &'a FlowGraph,
    pub services: &'a StepServices,
}

impl<'a> StepContext<'a> {
    pub fn new(tree: &'a TreeHandle, graph: &'a FlowGraph, services: &'a StepServices) -> Self {
        Self {
            tree,
            graph,
            services,
        }
    }

    pub fn get_next_step(&self, step_id: &StepId, output: &str) -> Result<Option<&'a FlowStep>> {
        self.graph.next_step(step_id, output)
    }
}

/// A step type: default settings plus the behavior run when a step of this type
/// is dispatched.
#[async_trait]
pub trait StepType: Debug + Send + Sync {
    fn type_name(&self) -> &'static str;

    fn default_data(&self) -> Value;

    /// Whether steps of this type may hand a prompt to the generation queue and
    /// wait for it. Only these may return `AwaitGeneration` or `FanOut`.
    fn suspends_for_generation(&self) -> bool;

    /// Named outputs steps of this type can follow.
    fn outputs(&self) -> &'static [&'static str] {
        &[DEFAULT_OUTPUT]
    }

    async fn execute(&self, step: &FlowStep, ctx: &StepContext<'_>) -> Result<StepOutcome>;
}

/// Decodes a step's data blob, treating `null` as the type's defaults.
pub fn parse_data<T>(step: &FlowStep) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if step.data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(step.data.clone()).map_err(|e| FlowError::InvalidData {
        step_type: step.step_type.clone(),
        message: e.to_string(),
    })
}

/// Appends a user prompt and a pending assistant slot after the active path.
/// Returns the slot.
pub fn submit_prompt(
    tree: &mut ConversationTree,
    prompt: impl Into<String>,
    agent: Option<String>,
) -> MessageId {
    tree.add_message(MessageValue::user(prompt));
    tree.add_message(MessageValue::pending_assistant().with_agent(agent))
}

/// Text of the last message on the active path, empty when there is none.
pub fn last_message_text(tree: &ConversationTree) -> String {
    tree.last_message_on_active_path()
        .map(|node| node.value.text().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::Role;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct Sample {
        prompt: String,
        count: usize,
    }

    fn step_with(data: Value) -> FlowStep {
        FlowStep {
            id: StepId::from("s"),
            step_type: "sample".into(),
            x: 0.0,
            y: 0.0,
            data,
            is_minimized: false,
        }
    }

    #[test]
    fn test_parse_data_defaults_and_errors() {
        let parsed: Sample = parse_data(&step_with(Value::Null)).unwrap();
        assert_eq!(parsed.count, 0);

        let parsed: Sample = parse_data(&step_with(json!({"prompt": "x"}))).unwrap();
        assert_eq!(parsed.prompt, "x");

        let err = parse_data::<Sample>(&step_with(json!({"count": "many"}))).unwrap_err();
        assert!(matches!(err, FlowError::InvalidData { .. }));
    }

    #[test]
    fn test_submit_prompt_adds_turn() {
        let mut tree = ConversationTree::new();
        tree.add_message(MessageValue::system("be brief"));
        let slot = submit_prompt(&mut tree, "hello", Some("writer".into()));

        let path = tree.active_path_values();
        assert_eq!(path.len(), 3);
        assert_eq!(path[1].role, Role::User);
        assert_eq!(tree.find_first_pending_assistant_message(), Some(slot));
        assert_eq!(path[2].agent.as_deref(), Some("writer"));
        assert_eq!(last_message_text(&tree), "");
    }

    #[test]
    fn test_context_next_step() {
        let mut graph = FlowGraph::new("ctx");
        graph.insert_step(step_with(json!({})));
        let tree = TreeHandle::new(ConversationTree::new());
        let services = StepServices::default();
        let ctx = StepContext::new(&tree, &graph, &services);
        assert!(ctx.get_next_step(&StepId::from("s"), DEFAULT_OUTPUT).unwrap().is_none());
    }
}
