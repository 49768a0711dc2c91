//! Step-type registry

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::step::StepType;
use crate::steps;

/// Lookup table from step type name to its definition.
///
/// Passed explicitly to graphs and runners, so independent sessions can run
/// with different sets of step types.
#[derive(Debug, Default, Clone)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn StepType>>,
}

impl StepRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in step type.
    pub fn with_builtin_steps() -> Self {
        let mut registry = Self::new();
        for step in steps::builtin_steps() {
            registry.register(step);
        }
        registry
    }

    /// Registers a step type, returning the definition it replaced.
    pub fn register(&mut self, step: Arc<dyn StepType>) -> Option<Arc<dyn StepType>> {
        tracing::debug!(step_type = step.type_name(), "Registering step type");
        self.steps.insert(step.type_name().to_string(), step)
    }

    /// Get a step type by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn StepType>> {
        self.steps.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn default_data(&self, name: &str) -> Option<Value> {
        self.steps.get(name).map(|step| step.default_data())
    }
}
