pub mod data_nodes;
pub mod orchestrator;
pub mod scheduler;

pub use data_nodes::{DataNodeCatalog, InMemoryDataNodeCatalog};
pub use orchestrator::Orchestrator;
pub use scheduler::{Readiness, SchedulerStep, SchedulingView, topological_order};

use crate::models::{BoundCallable, CoreError};

pub type OrchestrationResult<T> = Result<T, CoreError>;

/// Per-submission settings applied to every job the submission creates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubmissionOptions {
    /// Entity that triggered the submission; defaults to the submission id.
    pub submit_entity_id: Option<String>,
    /// Run even when inputs are stale.
    pub force: bool,
    pub subscribers: Vec<BoundCallable>,
}

impl SubmissionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted_by(mut self, entity_id: impl Into<String>) -> Self {
        self.submit_entity_id = Some(entity_id.into());
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_subscriber(mut self, subscriber: BoundCallable) -> Self {
        self.subscribers.push(subscriber);
        self
    }
}
