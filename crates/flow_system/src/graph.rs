//! Flow graph: typed steps joined by named-output connections.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::registry::StepRegistry;

/// Output followed when a step does not pick one.
pub const DEFAULT_OUTPUT: &str = "default";

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(FlowId);
string_id!(StepId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub id: StepId,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Settings blob, shaped by the step type.
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub is_minimized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub from: StepId,
    pub to: StepId,
    #[serde(default = "default_output_name")]
    pub output_name: String,
}

fn default_output_name() -> String {
    DEFAULT_OUTPUT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub id: FlowId,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<FlowStep>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl FlowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: FlowId::new(),
            name: name.into(),
            steps: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // ========== Steps ==========

    /// Adds a step of a registered type, seeded with that type's default data.
    pub fn add_step(
        &mut self,
        step_type: &str,
        x: f64,
        y: f64,
        registry: &StepRegistry,
    ) -> Result<StepId> {
        let definition = registry
            .get(step_type)
            .ok_or_else(|| FlowError::UnknownStepType(step_type.to_string()))?;
        let step = FlowStep {
            id: StepId::new(),
            step_type: step_type.to_string(),
            x,
            y,
            data: definition.default_data(),
            is_minimized: false,
        };
        let id = step.id.clone();
        self.steps.push(step);
        Ok(id)
    }

    /// Inserts a fully formed step, replacing any step with the same id.
    pub fn insert_step(&mut self, step: FlowStep) {
        match self.steps.iter_mut().find(|s| s.id == step.id) {
            Some(existing) => *existing = step,
            None => self.steps.push(step),
        }
    }

    pub fn step(&self, id: &StepId) -> Option<&FlowStep> {
        self.steps.iter().find(|s| &s.id == id)
    }

    pub fn step_mut(&mut self, id: &StepId) -> Option<&mut FlowStep> {
        self.steps.iter_mut().find(|s| &s.id == id)
    }

    /// Merges `patch` into the step's data. Object patches update individual
    /// keys; anything else replaces the data wholesale.
    pub fn update_step_data(&mut self, id: &StepId, patch: Value) -> bool {
        let Some(step) = self.step_mut(id) else {
            return false;
        };
        match (&mut step.data, patch) {
            (Value::Object(data), Value::Object(patch)) => {
                for (key, value) in patch {
                    data.insert(key, value);
                }
            }
            (data, patch) => *data = patch,
        }
        true
    }

    pub fn move_step(&mut self, id: &StepId, x: f64, y: f64) -> bool {
        match self.step_mut(id) {
            Some(step) => {
                step.x = x;
                step.y = y;
                true
            }
            None => false,
        }
    }

    pub fn set_minimized(&mut self, id: &StepId, minimized: bool) -> bool {
        match self.step_mut(id) {
            Some(step) => {
                step.is_minimized = minimized;
                true
            }
            None => false,
        }
    }

    /// Removes a step together with every connection touching it.
    pub fn remove_step(&mut self, id: &StepId) -> Option<FlowStep> {
        let index = self.steps.iter().position(|s| &s.id == id)?;
        self.connections.retain(|c| &c.from != id && &c.to != id);
        Some(self.steps.remove(index))
    }

    // ========== Connections ==========

    /// Connects `from`'s `output` to `to`, replacing whatever that output fed before.
    pub fn connect(&mut self, from: &StepId, to: &StepId, output: &str) -> Result<()> {
        for id in [from, to] {
            if self.step(id).is_none() {
                return Err(FlowError::StepNotFound(id.clone()));
            }
        }
        self.connections
            .retain(|c| !(&c.from == from && c.output_name == output));
        self.connections.push(Connection {
            from: from.clone(),
            to: to.clone(),
            output_name: output.to_string(),
        });
        Ok(())
    }

    pub fn disconnect(&mut self, from: &StepId, output: &str) -> Option<Connection> {
        let index = self
            .connections
            .iter()
            .position(|c| &c.from == from && c.output_name == output)?;
        Some(self.connections.remove(index))
    }

    // ========== Traversal ==========

    /// The unique step with no incoming connection.
    pub fn start_step(&self) -> Result<&FlowStep> {
        let targets: HashSet<&StepId> = self.connections.iter().map(|c| &c.to).collect();
        let mut candidates = self.steps.iter().filter(|s| !targets.contains(&s.id));
        match (candidates.next(), candidates.next()) {
            (None, _) => Err(FlowError::NoStartStep),
            (Some(step), None) => Ok(step),
            (Some(first), Some(second)) => {
                let mut ids = vec![first.id.clone(), second.id.clone()];
                ids.extend(candidates.map(|s| s.id.clone()));
                Err(FlowError::AmbiguousStart(ids))
            }
        }
    }

    /// Step reached through `(step_id, output)`, if that output is connected.
    ///
    /// The first matching connection wins when a malformed graph has several.
    pub fn next_step(&self, step_id: &StepId, output: &str) -> Result<Option<&FlowStep>> {
        let Some(connection) = self
            .connections
            .iter()
            .find(|c| &c.from == step_id && c.output_name == output)
        else {
            return Ok(None);
        };
        self.step(&connection.to)
            .map(Some)
            .ok_or_else(|| FlowError::DanglingConnection {
                from: connection.from.clone(),
                to: connection.to.clone(),
                output: connection.output_name.clone(),
            })
    }

    /// Checks step types, connection endpoints and output names, and that the
    /// graph has exactly one start step.
    pub fn validate(&self, registry: &StepRegistry) -> Result<()> {
        for step in &self.steps {
            if !registry.contains(&step.step_type) {
                return Err(FlowError::UnknownStepType(step.step_type.clone()));
            }
        }
        for connection in &self.connections {
            let (Some(from), Some(_)) = (self.step(&connection.from), self.step(&connection.to))
            else {
                return Err(FlowError::DanglingConnection {
                    from: connection.from.clone(),
                    to: connection.to.clone(),
                    output: connection.output_name.clone(),
                });
            };
            let outputs = registry
                .get(&from.step_type)
                .map(|definition| definition.outputs())
                .unwrap_or_default();
            if !outputs.contains(&connection.output_name.as_str()) {
                return Err(FlowError::UnknownOutput {
                    step_type: from.step_type.clone(),
                    output: connection.output_name.clone(),
                });
            }
        }
        self.start_step().map(|_| ())
    }
}
