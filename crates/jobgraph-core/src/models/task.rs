use std::collections::BTreeMap;

use serde_json::Value;

use crate::models::{BoundCallable, DataNodeId, TaskId};

pub const DEFAULT_VERSION: &str = "latest";

/// Reusable unit of work: ordered input and output data nodes plus the
/// function that turns the former into the latter.
#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub config_id: String,
    pub owner_id: Option<String>,
    pub properties: BTreeMap<String, Value>,
    pub input_ids: Vec<DataNodeId>,
    pub output_ids: Vec<DataNodeId>,
    pub function: BoundCallable,
    pub version: String,
}

impl Task {
    pub fn new(config_id: impl Into<String>, function: BoundCallable) -> Self {
        let config_id = config_id.into();
        Self {
            id: TaskId::generate(&config_id),
            config_id,
            owner_id: None,
            properties: BTreeMap::new(),
            input_ids: Vec::new(),
            output_ids: Vec::new(),
            function,
            version: DEFAULT_VERSION.to_string(),
        }
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = impl Into<DataNodeId>>) -> Self {
        self.input_ids = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_outputs(
        mut self,
        outputs: impl IntoIterator<Item = impl Into<DataNodeId>>,
    ) -> Self {
        self.output_ids = outputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Whether any output of `upstream` is an input of `self`.
    pub fn consumes_outputs_of(&self, upstream: &Task) -> bool {
        upstream
            .output_ids
            .iter()
            .any(|output| self.input_ids.contains(output))
    }
}
