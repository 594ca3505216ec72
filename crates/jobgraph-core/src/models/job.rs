use chrono::{DateTime, Utc};

use crate::models::{BoundCallable, CallableRef, JobId, JobStatus, Task, TaskId};

/// One execution attempt of a [`Task`].
///
/// Once `status` is terminal the job only ever changes by having records
/// appended to `stacktrace`.
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub task: Task,
    pub submit_id: String,
    pub submit_entity_id: String,
    pub force: bool,
    pub status: JobStatus,
    pub creation_date: DateTime<Utc>,
    pub subscribers: Vec<BoundCallable>,
    pub stacktrace: Vec<String>,
    pub version: String,
}

impl Job {
    pub fn new(
        id: JobId,
        task: Task,
        submit_id: impl Into<String>,
        submit_entity_id: impl Into<String>,
    ) -> Self {
        let version = task.version.clone();
        Self {
            id,
            task,
            submit_id: submit_id.into(),
            submit_entity_id: submit_entity_id.into(),
            force: false,
            status: JobStatus::Submitted,
            creation_date: Utc::now(),
            subscribers: Vec::new(),
            stacktrace: Vec::new(),
            version,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task.id
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn subscribe(&mut self, subscriber: BoundCallable) {
        self.subscribers.push(subscriber);
    }

    pub fn record_failure(&mut self, context: &str, error: impl std::fmt::Display) {
        self.stacktrace.push(format!(
            "[{}] {context}: {error}",
            Utc::now().to_rfc3339()
        ));
    }

    pub fn unresolved_subscribers(&self) -> Vec<&CallableRef> {
        self.subscribers
            .iter()
            .filter(|subscriber| !subscriber.is_resolved())
            .map(BoundCallable::reference)
            .collect()
    }

    /// Whether this job consumes an output of `upstream` within the same submission.
    pub fn depends_on(&self, upstream: &Job) -> bool {
        self.id != upstream.id
            && self.submit_id == upstream.submit_id
            && self.task.consumes_outputs_of(&upstream.task)
    }

    /// Ordering key used to break ties among simultaneously ready jobs.
    pub fn submission_order(&self) -> (DateTime<Utc>, &str, &str) {
        (self.creation_date, &self.submit_id, self.id.as_str())
    }
}
