use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{CallableRef, CoreError, DEFAULT_VERSION};
use crate::persistence::{ModelRecord, PersistenceResult};

/// First schema generation: the function is stored as two loose strings and
/// tasks carry neither an owner nor a version tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskModelV1 {
    pub id: String,
    pub config_id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub input_ids: Vec<String>,
    #[serde(default)]
    pub output_ids: Vec<String>,
    pub function_module: String,
    pub function_name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskModelV2 {
    pub id: String,
    pub config_id: String,
    pub owner_id: Option<String>,
    pub properties: BTreeMap<String, Value>,
    pub input_ids: Vec<String>,
    pub output_ids: Vec<String>,
    pub function_reference: CallableRef,
    pub version: String,
}

pub type TaskModel = TaskModelV2;

pub const TASK_SCHEMA_VERSION: i64 = 2;

impl From<TaskModelV1> for TaskModelV2 {
    fn from(legacy: TaskModelV1) -> Self {
        Self {
            id: legacy.id,
            config_id: legacy.config_id,
            owner_id: None,
            properties: legacy.properties,
            input_ids: legacy.input_ids,
            output_ids: legacy.output_ids,
            function_reference: CallableRef::new(legacy.function_module, legacy.function_name),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum VersionedTaskModel {
    V1(TaskModelV1),
    V2(TaskModelV2),
}

impl VersionedTaskModel {
    pub fn from_record(record: &ModelRecord) -> PersistenceResult<Self> {
        let document = record.document.clone();
        let model = match record.schema_version()? {
            1 => serde_json::from_value(document).map(Self::V1),
            2 => serde_json::from_value(document).map(Self::V2),
            other => {
                return Err(CoreError::deserialization(format!(
                    "task model '{}' has unsupported schema_version {other}",
                    record.id
                ))
                .with_entity("task"));
            }
        };
        model.map_err(|error| {
            CoreError::deserialization(format!("task model '{}' is malformed: {error}", record.id))
                .with_entity("task")
        })
    }

    pub fn into_current(self) -> TaskModel {
        match self {
            Self::V1(model) => model.into(),
            Self::V2(model) => model,
        }
    }
}
