//! Flow collection with persistence

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FlowError, Result};
use crate::graph::{FlowGraph, FlowId};
use crate::storage::FlowStorage;

/// Id-keyed collection of flows, written through to a [`FlowStorage`].
pub struct FlowManager {
    flows: HashMap<FlowId, FlowGraph>,
    storage: Arc<dyn FlowStorage>,
}

impl FlowManager {
    pub fn new(storage: Arc<dyn FlowStorage>) -> Self {
        Self {
            flows: HashMap::new(),
            storage,
        }
    }

    /// Replaces the in-memory collection with what storage holds.
    pub async fn load_all(&mut self) -> Result<usize> {
        let flows = self.storage.load_flows().await?;
        self.flows = flows.into_iter().map(|f| (f.id.clone(), f)).collect();
        tracing::info!(count = self.flows.len(), "Loaded flows");
        Ok(self.flows.len())
    }

    pub async fn create_flow(&mut self, name: impl Into<String>) -> Result<FlowId> {
        let flow = FlowGraph::new(name);
        let id = flow.id.clone();
        self.storage.save_flow(&flow).await?;
        self.flows.insert(id.clone(), flow);
        Ok(id)
    }

    /// Adds an existing flow (e.g. an imported snapshot). A flow with the same
    /// id is replaced.
    pub async fn add_flow_from_data(&mut self, flow: FlowGraph) -> Result<FlowId> {
        let id = flow.id.clone();
        self.storage.save_flow(&flow).await?;
        self.flows.insert(id.clone(), flow);
        Ok(id)
    }

    pub fn get(&self, id: &FlowId) -> Option<&FlowGraph> {
        self.flows.get(id)
    }

    /// Applies `edit` to a flow and persists the result.
    pub async fn update<F>(&mut self, id: &FlowId, edit: F) -> Result<()>
    where
        F: FnOnce(&mut FlowGraph),
    {
        let flow = self
            .flows
            .get_mut(id)
            .ok_or_else(|| FlowError::FlowNotFound(id.clone()))?;
        edit(flow);
        flow.id = id.clone();
        self.storage.save_flow(flow).await
    }

    pub async fn rename(&mut self, id: &FlowId, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.update(id, |flow| flow.name = name).await
    }

    pub async fn delete(&mut self, id: &FlowId) -> Result<bool> {
        let existed = self.flows.remove(id).is_some();
        let deleted = self.storage.delete_flow(id).await?;
        Ok(existed || deleted)
    }

    /// Flows sorted by name.
    pub fn list(&self) -> Vec<&FlowGraph> {
        let mut flows: Vec<&FlowGraph> = self.flows.values().collect();
        flows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        flows
    }
}
