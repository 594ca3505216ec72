use std::sync::Arc;

use crate::config::{CoreConfig, RepositoryType};
use crate::persistence::{FileSystemStore, PersistenceResult, StorageBackend};
use crate::registry::CallableRegistry;
use crate::repository::{
    CallableResolver, JobConverter, JobRepository, Repository, TaskConverter, TaskRepository,
};
use crate::sqlite::SqliteStore;

/// Builds the one storage backend selected by configuration and hands out
/// repositories over it. Changing `repository_type` means building a new factory.
#[derive(Clone)]
pub struct RepositoryFactory {
    backend: Arc<dyn StorageBackend>,
    resolver: CallableResolver,
}

impl RepositoryFactory {
    pub fn from_config(
        config: &CoreConfig,
        registry: Arc<CallableRegistry>,
    ) -> PersistenceResult<Self> {
        let backend: Arc<dyn StorageBackend> = match config.repository_type {
            RepositoryType::Filesystem => {
                Arc::new(FileSystemStore::new(config.storage_folder.clone()))
            }
            RepositoryType::Sql => {
                let store = SqliteStore::new(config.sql_database.clone());
                store.migrate_to_latest()?;
                Arc::new(store)
            }
        };
        tracing::debug!(
            backend = backend.backend_name(),
            "repository backend selected"
        );

        Ok(Self::with_backend(
            backend,
            CallableResolver::new(registry, config.unresolved_callables),
        ))
    }

    pub fn with_backend(backend: Arc<dyn StorageBackend>, resolver: CallableResolver) -> Self {
        Self { backend, resolver }
    }

    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        Arc::clone(&self.backend)
    }

    pub fn task_repository(&self) -> TaskRepository {
        Repository::new(self.backend(), TaskConverter::new(self.resolver.clone()))
    }

    pub fn job_repository(&self) -> JobRepository {
        Repository::new(
            self.backend(),
            JobConverter::new(self.resolver.clone(), self.task_repository()),
        )
    }
}
