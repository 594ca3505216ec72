use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{CoreError, DataNode, DataNodeId, Edit};
use crate::orchestration::OrchestrationResult;

/// Read access to data node edit histories plus the one write the core
/// performs: appending an edit when a producing job completes.
pub trait DataNodeCatalog: Send + Sync {
    fn data_node(&self, id: &DataNodeId) -> OrchestrationResult<Option<DataNode>>;

    fn record_edit(&self, id: &DataNodeId, edit: Edit) -> OrchestrationResult<()>;
}

#[derive(Default)]
pub struct InMemoryDataNodeCatalog {
    nodes: RwLock<HashMap<DataNodeId, DataNode>>,
}

impl InMemoryDataNodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, node: DataNode) -> OrchestrationResult<()> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;
        nodes.insert(node.id.clone(), node);
        Ok(())
    }
}

impl DataNodeCatalog for InMemoryDataNodeCatalog {
    fn data_node(&self, id: &DataNodeId) -> OrchestrationResult<Option<DataNode>> {
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        Ok(nodes.get(id).cloned())
    }

    fn record_edit(&self, id: &DataNodeId, edit: Edit) -> OrchestrationResult<()> {
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;
        nodes
            .entry(id.clone())
            .or_insert_with(|| DataNode::new(id.clone()))
            .edits
            .push(edit);
        Ok(())
    }
}

fn poisoned() -> CoreError {
    CoreError::internal("data node catalog lock poisoned")
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{DataNodeCatalog, InMemoryDataNodeCatalog};
    use crate::models::{DataNodeId, Edit, JobId};

    #[test]
    fn recording_an_edit_creates_unknown_nodes() {
        let catalog = InMemoryDataNodeCatalog::new();
        let id = DataNodeId::from("cleaned");
        assert!(catalog.data_node(&id).unwrap().is_none());

        catalog
            .record_edit(&id, Edit::by_job(JobId::from("JOB_1"), Utc::now()))
            .unwrap();

        let node = catalog.data_node(&id).unwrap().unwrap();
        assert_eq!(node.edits.len(), 1);
        assert_eq!(node.last_edit().unwrap().job_id, Some(JobId::from("JOB_1")));
    }
}
