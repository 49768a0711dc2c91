//! Persistence for flows and tree snapshots.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chat_core::{AlternativeSetSnapshot, ConversationTree, TreeId};
use tokio::fs;

use crate::error::{FlowError, Result};
use crate::graph::{FlowGraph, FlowId};

const FLOW_EXTENSION: &str = "json";
const TREE_SUFFIX: &str = ".tree.json";

#[async_trait]
pub trait FlowStorage: Send + Sync {
    async fn save_flow(&self, flow: &FlowGraph) -> Result<()>;
    async fn load_flow(&self, id: &FlowId) -> Result<Option<FlowGraph>>;
    async fn load_flows(&self) -> Result<Vec<FlowGraph>>;
    async fn delete_flow(&self, id: &FlowId) -> Result<bool>;

    async fn save_tree(&self, tree: &ConversationTree) -> Result<()>;
    async fn load_tree(&self, id: TreeId) -> Result<Option<ConversationTree>>;
}

/// One pretty-printed JSON file per flow (`<id>.json`) and per tree snapshot
/// (`<tree id>.tree.json`) in a single directory.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    base_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub async fn init(&self) -> io::Result<()> {
        fs::create_dir_all(&self.base_path).await
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// The file for `id`. Ids that are not a plain file name are rejected so
    /// imported flows cannot write outside the base path.
    fn flow_path(&self, id: &FlowId) -> Result<PathBuf> {
        let name = id.as_str();
        let plain = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', ':', '\0']);
        if !plain {
            return Err(FlowError::InvalidFlowId(id.clone()));
        }
        Ok(self.base_path.join(format!("{name}.{FLOW_EXTENSION}")))
    }

    fn tree_path(&self, id: TreeId) -> PathBuf {
        self.base_path.join(format!("{id}{TREE_SUFFIX}"))
    }
}

async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

#[async_trait]
impl FlowStorage for JsonFileStorage {
    async fn save_flow(&self, flow: &FlowGraph) -> Result<()> {
        let path = self.flow_path(&flow.id)?;
        self.init().await?;
        fs::write(path, flow.to_json()?).await?;
        Ok(())
    }

    async fn load_flow(&self, id: &FlowId) -> Result<Option<FlowGraph>> {
        match read_optional(&self.flow_path(id)?).await? {
            Some(content) => Ok(Some(FlowGraph::from_json(&content)?)),
            None => Ok(None),
        }
    }

    async fn load_flows(&self) -> Result<Vec<FlowGraph>> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut flows = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(TREE_SUFFIX) || !name.ends_with(".json") {
                continue;
            }
            let content = fs::read_to_string(&path).await?;
            match FlowGraph::from_json(&content) {
                Ok(flow) => flows.push(flow),
                Err(error) => {
                    tracing::warn!(path = %path.display(), "Skipping unreadable flow: {}", error)
                }
            }
        }
        flows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(flows)
    }

    async fn delete_flow(&self, id: &FlowId) -> Result<bool> {
        match fs::remove_file(self.flow_path(id)?).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn save_tree(&self, tree: &ConversationTree) -> Result<()> {
        self.init().await?;
        fs::write(self.tree_path(tree.id()), tree.to_json()?).await?;
        tracing::debug!(tree_id = %tree.id(), "Saved tree snapshot");
        Ok(())
    }

    async fn load_tree(&self, id: TreeId) -> Result<Option<ConversationTree>> {
        let Some(content) = read_optional(&self.tree_path(id)).await? else {
            return Ok(None);
        };
        let snapshot: Option<AlternativeSetSnapshot> = serde_json::from_str(&content)?;
        Ok(Some(ConversationTree::from_snapshot_with_id(id, snapshot)))
    }
}
