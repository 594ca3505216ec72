use crate::models::{DataNodeId, Task, TaskId};
use crate::persistence::{Collection, ModelRecord, PersistenceResult};
use crate::registry::{CallableKind, serialize_callable};
use crate::repository::task_model::{TASK_SCHEMA_VERSION, TaskModel, VersionedTaskModel};
use crate::repository::{CallableResolver, EntityConverter};

#[derive(Clone)]
pub struct TaskConverter {
    resolver: CallableResolver,
}

impl TaskConverter {
    pub fn new(resolver: CallableResolver) -> Self {
        Self { resolver }
    }
}

impl EntityConverter for TaskConverter {
    type Entity = Task;
    type Model = TaskModel;

    const COLLECTION: Collection = Collection::Tasks;
    const SCHEMA_VERSION: i64 = TASK_SCHEMA_VERSION;

    fn entity_id(entity: &Task) -> String {
        entity.id.to_string()
    }

    fn entity_to_model(&self, task: &Task) -> TaskModel {
        TaskModel {
            id: task.id.to_string(),
            config_id: task.config_id.clone(),
            owner_id: task.owner_id.clone(),
            properties: task.properties.clone(),
            input_ids: task.input_ids.iter().map(ToString::to_string).collect(),
            output_ids: task.output_ids.iter().map(ToString::to_string).collect(),
            function_reference: serialize_callable(&task.function),
            version: task.version.clone(),
        }
    }

    fn decode_model(&self, record: &ModelRecord) -> PersistenceResult<TaskModel> {
        Ok(VersionedTaskModel::from_record(record)?.into_current())
    }

    fn model_to_entity(&self, model: TaskModel) -> PersistenceResult<Task> {
        let function = self.resolver.resolve(
            CallableKind::TaskFunction,
            &model.id,
            &model.function_reference,
        )?;

        Ok(Task {
            id: TaskId::new(model.id),
            config_id: model.config_id,
            owner_id: model.owner_id,
            properties: model.properties,
            input_ids: model.input_ids.into_iter().map(DataNodeId::new).collect(),
            output_ids: model.output_ids.into_iter().map(DataNodeId::new).collect(),
            function,
            version: model.version,
        })
    }
}
