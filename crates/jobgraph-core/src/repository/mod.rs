pub mod factory;
pub mod job_converter;
pub mod job_model;
pub mod task_converter;
pub mod task_model;

use std::sync::Arc;

use serde::Serialize;

use crate::models::{BoundCallable, CallableRef, CoreError};
use crate::persistence::{
    Collection, ModelFilter, ModelRecord, PersistenceResult, StorageBackend, stamp_schema_version,
};
use crate::registry::{CallableKind, CallableRegistry, ResolutionPolicy};

pub use factory::RepositoryFactory;
pub use job_converter::JobConverter;
pub use job_model::{JobModel, JobModelV1, JobModelV2, LegacySubscriber, VersionedJobModel};
pub use task_converter::TaskConverter;
pub use task_model::{TaskModel, TaskModelV1, TaskModelV2, VersionedTaskModel};

/// Maps one entity type to and from its current storage model.
pub trait EntityConverter: Send + Sync {
    type Entity;
    type Model: Serialize;

    const COLLECTION: Collection;
    const SCHEMA_VERSION: i64;

    fn entity_id(entity: &Self::Entity) -> String;

    fn entity_to_model(&self, entity: &Self::Entity) -> Self::Model;

    /// Decode a stored record of any known schema generation into the current model.
    fn decode_model(&self, record: &ModelRecord) -> PersistenceResult<Self::Model>;

    fn model_to_entity(&self, model: Self::Model) -> PersistenceResult<Self::Entity>;
}

/// Resolves stored callable references, applying the configured policy to
/// references the registry no longer knows.
#[derive(Clone)]
pub struct CallableResolver {
    registry: Arc<CallableRegistry>,
    policy: ResolutionPolicy,
}

impl CallableResolver {
    pub fn new(registry: Arc<CallableRegistry>, policy: ResolutionPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> ResolutionPolicy {
        self.policy
    }

    pub fn registry(&self) -> &Arc<CallableRegistry> {
        &self.registry
    }

    pub fn resolve(
        &self,
        kind: CallableKind,
        owner_id: &str,
        reference: &CallableRef,
    ) -> PersistenceResult<BoundCallable> {
        match self.registry.resolve(kind, reference) {
            Ok(bound) => Ok(bound),
            Err(error) if error.is_deserialization() && self.policy == ResolutionPolicy::Placeholder => {
                tracing::warn!(
                    owner_id,
                    callable = %reference,
                    kind = kind.as_str(),
                    error = %error.message,
                    "loading with a no-op placeholder for unresolved callable"
                );
                Ok(BoundCallable::placeholder(reference.clone()))
            }
            Err(error) => Err(CoreError {
                message: format!("{} (while loading '{owner_id}')", error.message),
                ..error
            }),
        }
    }
}

/// Persistence facade for one entity type: a converter over a storage backend.
pub struct Repository<C> {
    backend: Arc<dyn StorageBackend>,
    converter: C,
}

impl<C: Clone> Clone for Repository<C> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            converter: self.converter.clone(),
        }
    }
}

pub type TaskRepository = Repository<TaskConverter>;
pub type JobRepository = Repository<JobConverter>;

impl<C: EntityConverter> Repository<C> {
    pub fn new(backend: Arc<dyn StorageBackend>, converter: C) -> Self {
        Self { backend, converter }
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn save(&self, entity: &C::Entity) -> PersistenceResult<()> {
        let model = self.converter.entity_to_model(entity);
        let document = serde_json::to_value(&model).map_err(|error| {
            CoreError::internal(format!(
                "failed to encode {} model: {error}",
                C::COLLECTION.entity_name()
            ))
        })?;
        let document = stamp_schema_version(document, C::SCHEMA_VERSION)?;
        self.backend
            .upsert(C::COLLECTION, &ModelRecord::new(C::entity_id(entity), document))
    }

    pub fn load(&self, id: &str) -> PersistenceResult<C::Entity> {
        let record = self.backend.fetch(C::COLLECTION, id)?;
        self.decode(&record)
    }

    pub fn load_all(&self, filter: Option<&ModelFilter>) -> PersistenceResult<Vec<C::Entity>> {
        self.backend
            .fetch_all(C::COLLECTION, filter)?
            .iter()
            .map(|record| self.decode(record))
            .collect()
    }

    /// Decode every matching record on its own, pairing each id with its
    /// outcome. Only a backend failure fails the whole call.
    pub fn load_each(
        &self,
        filter: Option<&ModelFilter>,
    ) -> PersistenceResult<Vec<(String, PersistenceResult<C::Entity>)>> {
        Ok(self
            .backend
            .fetch_all(C::COLLECTION, filter)?
            .iter()
            .map(|record| (record.id.clone(), self.decode(record)))
            .collect())
    }

    pub fn exists(&self, id: &str) -> PersistenceResult<bool> {
        match self.backend.fetch(C::COLLECTION, id) {
            Ok(_) => Ok(true),
            Err(error) if error.is_not_found() => Ok(false),
            Err(error) => Err(error),
        }
    }

    pub fn delete(&self, id: &str) -> PersistenceResult<()> {
        self.backend.remove(C::COLLECTION, id)
    }

    pub fn delete_all(&self) -> PersistenceResult<()> {
        self.backend.remove_all(C::COLLECTION)
    }

    fn decode(&self, record: &ModelRecord) -> PersistenceResult<C::Entity> {
        let model = self.converter.decode_model(record)?;
        self.converter.model_to_entity(model)
    }
}
