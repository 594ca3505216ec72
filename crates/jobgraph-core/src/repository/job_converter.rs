use crate::models::{Job, JobId};
use crate::persistence::{Collection, ModelRecord, PersistenceResult};
use crate::registry::{CallableKind, serialize_callable};
use crate::repository::job_model::{JOB_SCHEMA_VERSION, JobModel, VersionedJobModel};
use crate::repository::{CallableResolver, EntityConverter, TaskRepository};

/// Jobs are stored with a `task_id` only; loading one loads its task, so a
/// job whose task record is gone fails with the task's `NotFound`.
#[derive(Clone)]
pub struct JobConverter {
    resolver: CallableResolver,
    tasks: TaskRepository,
}

impl JobConverter {
    pub fn new(resolver: CallableResolver, tasks: TaskRepository) -> Self {
        Self { resolver, tasks }
    }
}

impl EntityConverter for JobConverter {
    type Entity = Job;
    type Model = JobModel;

    const COLLECTION: Collection = Collection::Jobs;
    const SCHEMA_VERSION: i64 = JOB_SCHEMA_VERSION;

    fn entity_id(entity: &Job) -> String {
        entity.id.to_string()
    }

    fn entity_to_model(&self, job: &Job) -> JobModel {
        JobModel {
            id: job.id.to_string(),
            task_id: job.task.id.to_string(),
            status: job.status,
            force: job.force,
            submit_id: job.submit_id.clone(),
            submit_entity_id: job.submit_entity_id.clone(),
            creation_date: job.creation_date,
            subscribers: job.subscribers.iter().map(serialize_callable).collect(),
            stacktrace: job.stacktrace.clone(),
            version: job.version.clone(),
        }
    }

    fn decode_model(&self, record: &ModelRecord) -> PersistenceResult<JobModel> {
        VersionedJobModel::from_record(record)?.into_current()
    }

    fn model_to_entity(&self, model: JobModel) -> PersistenceResult<Job> {
        let task = self.tasks.load(&model.task_id)?;
        let subscribers = model
            .subscribers
            .iter()
            .map(|reference| {
                self.resolver
                    .resolve(CallableKind::Subscriber, &model.id, reference)
            })
            .collect::<PersistenceResult<Vec<_>>>()?;

        Ok(Job {
            id: JobId::new(model.id),
            task,
            submit_id: model.submit_id,
            submit_entity_id: model.submit_entity_id,
            force: model.force,
            status: model.status,
            creation_date: model.creation_date,
            subscribers,
            stacktrace: model.stacktrace,
            version: model.version,
        })
    }
}
