use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Notify, Semaphore};
use tokio::time::{Instant, timeout_at};

use crate::config::{CoreConfig, validate_config};
use crate::execution::{ExecutionResult, RegisteredFunctionExecutor, TaskExecutor, panic_message};
use crate::models::{
    CoreError, CoreErrorKind, DataNodeId, Edit, Job, JobId, JobStatus, Task, generate_submit_id,
};
use crate::orchestration::scheduler::{self, SchedulerStep, SchedulingView};
use crate::orchestration::{
    DataNodeCatalog, InMemoryDataNodeCatalog, OrchestrationResult, SubmissionOptions,
};
use crate::persistence::{Collection, ModelFilter, StorageBackend};
use crate::repository::{JobRepository, RepositoryFactory, TaskRepository};

const RECOVERABLE_STATUSES: [JobStatus; 4] = [
    JobStatus::Submitted,
    JobStatus::Blocked,
    JobStatus::Pending,
    JobStatus::Running,
];

/// Top-level driver: turns submitted tasks into jobs, moves them through
/// their lifecycle and hands ready ones to the executor.
///
/// Every status change of a job happens under that job's lock: the status is
/// updated, the job is saved, then its subscribers run in registration order.
/// Subscribers therefore must not call back into the orchestrator for the job
/// they are being notified about.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

struct OrchestratorInner {
    tasks: TaskRepository,
    jobs: JobRepository,
    executor: Arc<dyn TaskExecutor>,
    catalog: Arc<dyn DataNodeCatalog>,
    workers: Arc<Semaphore>,
    version: String,
    state: Mutex<OrchestratorState>,
    scheduling: Mutex<()>,
}

/// Tracks unfinished jobs and the finished ones an unfinished job of the same
/// submission still depends on. Other finished jobs are dropped after each
/// scheduling pass and reloaded from the repository on demand.
#[derive(Default)]
struct OrchestratorState {
    jobs: HashMap<JobId, Arc<Mutex<Job>>>,
    producers: HashSet<DataNodeId>,
    dispatched: HashSet<JobId>,
    notifiers: HashMap<JobId, Arc<Notify>>,
    /// Finished in memory but not in storage; never dropped.
    unsaved: HashSet<JobId>,
}

impl OrchestratorState {
    fn track(&mut self, job: Job) -> Arc<Mutex<Job>> {
        self.producers.extend(job.task.output_ids.iter().cloned());
        self.jobs
            .entry(job.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(job)))
            .clone()
    }
}

impl Orchestrator {
    pub fn new(config: &CoreConfig, repositories: &RepositoryFactory) -> OrchestrationResult<Self> {
        Self::with_collaborators(
            config,
            repositories,
            Arc::new(RegisteredFunctionExecutor::new()),
            Arc::new(InMemoryDataNodeCatalog::new()),
        )
    }

    pub fn with_collaborators(
        config: &CoreConfig,
        repositories: &RepositoryFactory,
        executor: Arc<dyn TaskExecutor>,
        catalog: Arc<dyn DataNodeCatalog>,
    ) -> OrchestrationResult<Self> {
        validate_config(config)?;

        let producers = stored_producers(repositories.backend().as_ref())?;

        Ok(Self {
            inner: Arc::new(OrchestratorInner {
                tasks: repositories.task_repository(),
                jobs: repositories.job_repository(),
                executor,
                catalog,
                workers: Arc::new(Semaphore::new(config.max_workers)),
                version: config.version.clone(),
                state: Mutex::new(OrchestratorState {
                    producers,
                    ..OrchestratorState::default()
                }),
                scheduling: Mutex::new(()),
            }),
        })
    }

    pub fn catalog(&self) -> Arc<dyn DataNodeCatalog> {
        Arc::clone(&self.inner.catalog)
    }

    /// Create one `SUBMITTED` job per task, persist tasks and jobs, then
    /// schedule. A dependency cycle among `tasks` is rejected before anything
    /// is written.
    pub fn submit(
        &self,
        tasks: impl IntoIterator<Item = Task>,
        options: SubmissionOptions,
    ) -> OrchestrationResult<Vec<Job>> {
        let tasks = tasks.into_iter().collect::<Vec<_>>();
        let mut seen = HashSet::new();
        if let Some(duplicate) = tasks.iter().find(|task| !seen.insert(&task.id)) {
            return Err(CoreError::invalid_input(format!(
                "task '{}' appears more than once in one submission",
                duplicate.id
            ))
            .with_entity("task"));
        }
        let order = scheduler::topological_order(&tasks)?;

        let submit_id = generate_submit_id();
        let submit_entity_id = options
            .submit_entity_id
            .clone()
            .unwrap_or_else(|| submit_id.clone());

        for task in &tasks {
            self.inner.tasks.save(task)?;
        }

        let mut created = Vec::with_capacity(tasks.len());
        for index in order {
            let task = tasks[index].clone();
            let mut job = Job::new(
                JobId::generate(&task.config_id),
                task,
                submit_id.clone(),
                submit_entity_id.clone(),
            );
            job.force = options.force;
            job.version = self.inner.version.clone();
            job.subscribers = options.subscribers.clone();
            self.inner.jobs.save(&job)?;
            created.push(job.id.clone());

            self.state()?.track(job);
        }

        tracing::debug!(
            submit_id = %submit_id,
            jobs = created.len(),
            "submission accepted"
        );

        self.schedule()?;
        created.iter().map(|job_id| self.job(job_id)).collect()
    }

    /// Promote, block or skip every waiting job until no further job gets
    /// skipped. Returns the status changes that were applied.
    pub fn schedule(&self) -> OrchestrationResult<Vec<SchedulerStep>> {
        let _pass = self
            .inner
            .scheduling
            .lock()
            .map_err(|_| poisoned("scheduling"))?;

        let mut applied = Vec::new();
        loop {
            let jobs = self.snapshot()?;
            let producers = self.state()?.producers.clone();
            let view = SchedulingView {
                jobs: &jobs,
                producers: &producers,
                catalog: self.inner.catalog.as_ref(),
                now: Utc::now(),
            };

            let mut skipped_any = false;
            for step in scheduler::plan(&view)? {
                match self.transition_job(&step.job_id, |status| status == step.from, step.to) {
                    Ok(true) => {
                        skipped_any |= step.to == JobStatus::Skipped;
                        applied.push(step);
                    }
                    Ok(false) => {}
                    Err(error) => tracing::error!(
                        job_id = %step.job_id,
                        status = step.to.as_str(),
                        kind = ?error.kind,
                        message = %error.message,
                        "failed to apply scheduling decision"
                    ),
                }
            }

            if !skipped_any {
                self.evict_settled()?;
                return Ok(applied);
            }
        }
    }

    /// Hand every `PENDING` job not already handed off to a worker. Workers are
    /// bounded by `max_workers`; each runs the job on a blocking thread and, once
    /// it finishes, dispatches whatever became ready.
    ///
    /// Returns immediately with the ids handed off. Must be called from within
    /// a tokio runtime.
    pub fn dispatch_ready_jobs(&self) -> OrchestrationResult<Vec<JobId>> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|error| {
            CoreError::new(
                CoreErrorKind::Internal,
                format!("dispatching jobs requires a tokio runtime: {error}"),
            )
        })?;

        let mut ready = self
            .snapshot()?
            .into_iter()
            .filter(|job| job.status == JobStatus::Pending)
            .collect::<Vec<_>>();
        ready.sort_by(|left, right| left.submission_order().cmp(&right.submission_order()));

        let dispatched = {
            let mut state = self.state()?;
            ready
                .into_iter()
                .filter(|job| state.dispatched.insert(job.id.clone()))
                .map(|job| job.id)
                .collect::<Vec<_>>()
        };

        for job_id in &dispatched {
            tracing::debug!(job_id = %job_id, "job dispatched");
            runtime.spawn(run_worker(self.clone(), job_id.clone()));
        }

        Ok(dispatched)
    }

    /// Run one `PENDING` job to completion on the calling thread.
    ///
    /// A job that already finished (for example one cancelled while it was
    /// queued) is left alone and its status returned.
    pub fn run_job(&self, job_id: &JobId) -> OrchestrationResult<JobStatus> {
        let job = {
            let handle = self.handle(job_id)?;
            let mut job = lock_job(&handle)?;
            if job.status.is_terminal() {
                return Ok(job.status);
            }
            if job.status != JobStatus::Pending {
                return Err(invalid_transition(&job, JobStatus::Running));
            }
            self.apply_transition(&mut job, JobStatus::Running)?;
            job.clone()
        };

        let outcome = self.inner.executor.execute(&job);
        self.finish_run(job_id, outcome)?;
        Ok(self.job(job_id)?.status)
    }

    /// Apply `new_status` to the job, then reschedule so dependents can move.
    ///
    /// Reports for a job that is already terminal are ignored; re-applying the
    /// current status is a no-op. Returns whether the status changed.
    pub fn on_status_change(
        &self,
        job_id: &JobId,
        new_status: JobStatus,
    ) -> OrchestrationResult<bool> {
        self.settle(job_id, new_status, None)
    }

    /// Cancel a non-terminal job and abandon every job of its submission that
    /// waits on it, transitively. A running worker is not interrupted; its
    /// completion report is ignored later. Returns the abandoned job ids.
    pub fn cancel(&self, job_id: &JobId) -> OrchestrationResult<Vec<JobId>> {
        let cancelled =
            self.transition_job(job_id, |status| !status.is_terminal(), JobStatus::Cancelled)?;
        if !cancelled {
            tracing::debug!(job_id = %job_id, "cancel ignored; job already finished");
            return Ok(Vec::new());
        }

        let mut abandoned = Vec::new();
        let mut frontier = vec![job_id.clone()];
        while let Some(upstream_id) = frontier.pop() {
            let jobs = self.snapshot()?;
            let Some(upstream) = jobs.iter().find(|job| job.id == upstream_id) else {
                continue;
            };

            for dependent in jobs.iter().filter(|job| job.depends_on(upstream)) {
                let changed = self.transition_job(
                    &dependent.id,
                    |status| matches!(status, JobStatus::Submitted | JobStatus::Blocked),
                    JobStatus::Abandoned,
                )?;
                if changed {
                    abandoned.push(dependent.id.clone());
                    frontier.push(dependent.id.clone());
                }
            }
        }

        self.schedule()?;
        Ok(abandoned)
    }

    /// Reload unfinished jobs after a restart. Jobs found `RUNNING` lost their
    /// worker and are failed; everything else is scheduled again. A job that
    /// can no longer be loaded (its task was deleted, a callable is gone under
    /// the `fail` policy) is logged and left out.
    pub fn recover(&self) -> OrchestrationResult<Vec<Job>> {
        let mut recovered = Vec::new();
        for status in RECOVERABLE_STATUSES {
            let filter = ModelFilter::new().eq("status", status.as_str());
            recovered.extend(self.load_recoverable(&filter)?);
        }
        let upstream = self.finished_upstream_of(&recovered)?;

        let mut interrupted = Vec::new();
        {
            let mut state = self.state()?;
            for job in recovered.iter().chain(&upstream).cloned() {
                if job.status == JobStatus::Running {
                    interrupted.push(job.id.clone());
                }
                state.track(job);
            }
        }

        for job_id in &interrupted {
            let handle = self.handle(job_id)?;
            let mut job = lock_job(&handle)?;
            if job.status == JobStatus::Running {
                job.record_failure("recovery", "job was interrupted before it finished");
                self.apply_transition(&mut job, JobStatus::Failed)?;
            }
        }

        tracing::debug!(
            jobs = recovered.len(),
            interrupted = interrupted.len(),
            "recovered unfinished jobs"
        );

        self.schedule()?;
        recovered.iter().map(|job| self.job(&job.id)).collect()
    }

    pub async fn wait_for_terminal(
        &self,
        job_id: &JobId,
        timeout_duration: Option<Duration>,
    ) -> OrchestrationResult<Job> {
        let deadline = timeout_duration.map(|duration| Instant::now() + duration);
        loop {
            let notify = self.notifier(job_id)?;
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let job = self.job(job_id)?;
            if job.is_finished() {
                return Ok(job);
            }

            match deadline {
                Some(deadline) => timeout_at(deadline, notified).await.map_err(|_| {
                    CoreError::new(
                        CoreErrorKind::Timeout,
                        format!("timed out waiting for job '{job_id}' to finish"),
                    )
                    .with_entity("job")
                })?,
                None => notified.await,
            }
        }
    }

    pub fn job(&self, job_id: &JobId) -> OrchestrationResult<Job> {
        let tracked = self.state()?.jobs.get(job_id).cloned();
        match tracked {
            Some(handle) => {
                let job = lock_job(&handle)?;
                Ok(job.clone())
            }
            None => self.inner.jobs.load(job_id.as_str()),
        }
    }

    pub fn jobs_for_submission(&self, submit_id: &str) -> OrchestrationResult<Vec<Job>> {
        let filter = ModelFilter::new().eq("submit_id", submit_id);
        let mut jobs = self.inner.jobs.load_all(Some(&filter))?;
        jobs.sort_by(|left, right| left.submission_order().cmp(&right.submission_order()));
        Ok(jobs)
    }

    fn finish_run(&self, job_id: &JobId, outcome: ExecutionResult<()>) -> OrchestrationResult<bool> {
        match outcome {
            Ok(()) => self.settle(job_id, JobStatus::Completed, None),
            Err(error) => {
                tracing::warn!(
                    job_id = %job_id,
                    kind = ?error.kind,
                    message = %error.message,
                    "task execution failed"
                );
                self.settle(job_id, JobStatus::Failed, Some(error.message))
            }
        }
    }

    fn settle(
        &self,
        job_id: &JobId,
        new_status: JobStatus,
        failure: Option<String>,
    ) -> OrchestrationResult<bool> {
        let outcome = {
            let handle = self.handle(job_id)?;
            let mut job = lock_job(&handle)?;
            if job.status.is_terminal() {
                if job.status != new_status {
                    tracing::debug!(
                        job_id = %job_id,
                        status = job.status.as_str(),
                        reported = new_status.as_str(),
                        "ignoring report for finished job"
                    );
                }
                return Ok(false);
            }
            if !job.status.can_transition_to(new_status) {
                return self.apply_transition(&mut job, new_status);
            }

            let was_running = job.status == JobStatus::Running;
            if let Some(failure) = failure {
                job.record_failure("task execution", failure);
            }
            match self.apply_transition(&mut job, new_status) {
                Ok(true) if was_running && new_status == JobStatus::Completed => {
                    self.record_outputs(&job).map(|()| true)
                }
                Ok(changed) => Ok(changed),
                Err(error) if was_running && new_status.is_terminal() => {
                    self.keep_unsaved_failure(&mut job, &error)?;
                    Err(error)
                }
                Err(error) => Err(error),
            }
        };

        if !matches!(outcome, Ok(false)) {
            self.schedule()?;
        }
        outcome
    }

    /// The final status of a finished run could not be saved. The stored job
    /// stays `RUNNING` for `recover` to fail later; in memory it is failed so
    /// dependents and waiters move on.
    fn keep_unsaved_failure(&self, job: &mut Job, error: &CoreError) -> OrchestrationResult<()> {
        tracing::error!(
            job_id = %job.id,
            kind = ?error.kind,
            message = %error.message,
            "failed to persist final job status"
        );
        job.record_failure("persistence", &error.message);
        job.status = JobStatus::Failed;
        self.state()?.unsaved.insert(job.id.clone());
        self.notify_finished(&job.id)
    }

    fn record_outputs(&self, job: &Job) -> OrchestrationResult<()> {
        let now = Utc::now();
        for output in &job.task.output_ids {
            self.inner
                .catalog
                .record_edit(output, Edit::by_job(job.id.clone(), now))?;
        }
        Ok(())
    }

    fn transition_job(
        &self,
        job_id: &JobId,
        allowed: impl Fn(JobStatus) -> bool,
        next: JobStatus,
    ) -> OrchestrationResult<bool> {
        let handle = self.handle(job_id)?;
        let mut job = lock_job(&handle)?;
        if !allowed(job.status) {
            return Ok(false);
        }
        self.apply_transition(&mut job, next)
    }

    /// Caller holds the job's lock.
    fn apply_transition(&self, job: &mut Job, next: JobStatus) -> OrchestrationResult<bool> {
        if job.status == next {
            return Ok(false);
        }
        if !job.status.can_transition_to(next) {
            return Err(invalid_transition(job, next));
        }

        let previous = job.status;
        job.status = next;
        if let Err(error) = self.inner.jobs.save(job) {
            job.status = previous;
            return Err(error);
        }

        tracing::debug!(
            job_id = %job.id,
            task_id = %job.task.id,
            from = previous.as_str(),
            status = next.as_str(),
            "job status changed"
        );

        if notify_subscribers(job) > 0
            && let Err(error) = self.inner.jobs.save(job)
        {
            tracing::error!(
                job_id = %job.id,
                kind = ?error.kind,
                message = %error.message,
                "failed to persist subscriber failure records"
            );
        }

        if next.is_terminal() {
            self.notify_finished(&job.id)?;
        }

        Ok(true)
    }

    fn notify_finished(&self, job_id: &JobId) -> OrchestrationResult<()> {
        let notify = self.state()?.notifiers.get(job_id).cloned();
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
        Ok(())
    }

    /// Drop finished jobs no unfinished job of their submission depends on.
    fn evict_settled(&self) -> OrchestrationResult<()> {
        let jobs = self.snapshot()?;
        let settled = jobs
            .iter()
            .filter(|job| job.is_finished())
            .filter(|job| {
                !jobs
                    .iter()
                    .any(|other| !other.is_finished() && other.depends_on(job))
            })
            .map(|job| job.id.clone())
            .collect::<Vec<_>>();

        let mut state = self.state()?;
        for job_id in &settled {
            if state.unsaved.contains(job_id) {
                continue;
            }
            state.jobs.remove(job_id);
            state.notifiers.remove(job_id);
        }
        Ok(())
    }

    fn load_recoverable(&self, filter: &ModelFilter) -> OrchestrationResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for (job_id, loaded) in self.inner.jobs.load_each(Some(filter))? {
            match loaded {
                Ok(job) => jobs.push(job),
                Err(error) if error.is_not_found() || error.is_deserialization() => {
                    tracing::warn!(
                        job_id = %job_id,
                        kind = ?error.kind,
                        message = %error.message,
                        "skipping job that can no longer be loaded"
                    );
                }
                Err(error) => return Err(error),
            }
        }
        Ok(jobs)
    }

    /// Finished jobs of the same submissions that `jobs` consume outputs of.
    fn finished_upstream_of(&self, jobs: &[Job]) -> OrchestrationResult<Vec<Job>> {
        let submissions = jobs
            .iter()
            .map(|job| job.submit_id.as_str())
            .collect::<HashSet<_>>();

        let mut upstream = Vec::new();
        for submit_id in submissions {
            let filter = ModelFilter::new().eq("submit_id", submit_id);
            upstream.extend(self.load_recoverable(&filter)?.into_iter().filter(|candidate| {
                candidate.is_finished() && jobs.iter().any(|job| job.depends_on(candidate))
            }));
        }
        Ok(upstream)
    }

    fn handle(&self, job_id: &JobId) -> OrchestrationResult<Arc<Mutex<Job>>> {
        if let Some(handle) = self.state()?.jobs.get(job_id).cloned() {
            return Ok(handle);
        }
        let job = self.inner.jobs.load(job_id.as_str())?;
        Ok(self.state()?.track(job))
    }

    fn snapshot(&self) -> OrchestrationResult<Vec<Job>> {
        let handles = self.state()?.jobs.values().cloned().collect::<Vec<_>>();
        handles
            .iter()
            .map(|handle| lock_job(handle).map(|job| job.clone()))
            .collect()
    }

    fn notifier(&self, job_id: &JobId) -> OrchestrationResult<Arc<Notify>> {
        let mut state = self.state()?;
        Ok(state
            .notifiers
            .entry(job_id.clone())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone())
    }

    fn release(&self, job_id: &JobId) -> OrchestrationResult<()> {
        self.state()?.dispatched.remove(job_id);
        Ok(())
    }

    fn state(&self) -> OrchestrationResult<MutexGuard<'_, OrchestratorState>> {
        self.inner.state.lock().map_err(|_| poisoned("orchestrator state"))
    }
}

async fn run_worker(orchestrator: Orchestrator, job_id: JobId) {
    let permit = Arc::clone(&orchestrator.inner.workers).acquire_owned().await;
    if permit.is_ok() {
        let worker = orchestrator.clone();
        let id = job_id.clone();
        match tokio::task::spawn_blocking(move || worker.run_job(&id)).await {
            Ok(Ok(status)) => {
                tracing::debug!(job_id = %job_id, status = status.as_str(), "worker finished");
            }
            Ok(Err(error)) => tracing::error!(
                job_id = %job_id,
                kind = ?error.kind,
                message = %error.message,
                "worker failed to run job"
            ),
            Err(join_error) => tracing::error!(
                job_id = %job_id,
                error = %join_error,
                "worker thread join failure"
            ),
        }
    }
    drop(permit);

    if let Err(error) = orchestrator.release(&job_id) {
        tracing::error!(job_id = %job_id, message = %error.message, "failed to release job");
    }
    if let Err(error) = orchestrator.dispatch_ready_jobs() {
        tracing::error!(message = %error.message, "failed to dispatch ready jobs");
    }
}

/// Invoke every subscriber in order, recording failures on the job instead
/// of propagating them. Returns the number of failures recorded.
fn notify_subscribers(job: &mut Job) -> usize {
    let subscribers = job.subscribers.clone();
    let mut failures = 0;
    for subscriber in &subscribers {
        let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.invoke(job)));
        let message = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(error)) => error.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };

        tracing::warn!(
            job_id = %job.id,
            subscriber = %subscriber.reference(),
            error = %message,
            "subscriber failed"
        );
        job.record_failure(&format!("subscriber {}", subscriber.reference()), message);
        failures += 1;
    }
    failures
}

/// Data nodes written by any stored task, read from the raw records so that
/// no callable has to resolve.
fn stored_producers(backend: &dyn StorageBackend) -> OrchestrationResult<HashSet<DataNodeId>> {
    let mut producers = HashSet::new();
    for record in backend.fetch_all(Collection::Tasks, None)? {
        let Some(outputs) = record.field("output_ids").and_then(Value::as_array) else {
            continue;
        };
        producers.extend(outputs.iter().filter_map(Value::as_str).map(DataNodeId::from));
    }
    Ok(producers)
}

fn lock_job(handle: &Mutex<Job>) -> OrchestrationResult<MutexGuard<'_, Job>> {
    handle.lock().map_err(|_| poisoned("job"))
}

fn invalid_transition(job: &Job, next: JobStatus) -> CoreError {
    CoreError::new(
        CoreErrorKind::InvalidTransition,
        format!(
            "job '{}' cannot move from {} to {}",
            job.id,
            job.status.as_str(),
            next.as_str()
        ),
    )
    .with_entity("job")
}

fn poisoned(what: &str) -> CoreError {
    CoreError::internal(format!("{what} mutex poisoned"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::Orchestrator;
    use crate::config::CoreConfig;
    use crate::models::{JobStatus, Task};
    use crate::orchestration::SubmissionOptions;
    use crate::registry::CallableRegistry;
    use crate::repository::RepositoryFactory;

    fn orchestrator(dir: &TempDir) -> (Orchestrator, Arc<CallableRegistry>) {
        let mut registry = CallableRegistry::new();
        registry
            .register_task_function("pipeline", "succeed", |_, _| Ok(()))
            .unwrap();
        let registry = Arc::new(registry);
        let config = CoreConfig::default().with_storage_root(dir.path());
        let repositories = RepositoryFactory::from_config(&config, registry.clone()).unwrap();
        (Orchestrator::new(&config, &repositories).unwrap(), registry)
    }

    fn task(registry: &CallableRegistry, config_id: &str, inputs: &[&str], outputs: &[&str]) -> Task {
        Task::new(
            config_id,
            registry.task_function("pipeline", "succeed", Vec::new()).unwrap(),
        )
        .with_inputs(inputs.iter().copied())
        .with_outputs(outputs.iter().copied())
    }

    fn tracked(orchestrator: &Orchestrator) -> (usize, usize) {
        let state = orchestrator.state().unwrap();
        (state.jobs.len(), state.notifiers.len())
    }

    #[test]
    fn finished_jobs_are_released_once_nothing_depends_on_them() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, registry) = orchestrator(&dir);
        let jobs = orchestrator
            .submit(
                [
                    task(&registry, "clean", &["raw"], &["cleaned"]),
                    task(&registry, "report", &["cleaned"], &["report"]),
                ],
                SubmissionOptions::new(),
            )
            .unwrap();
        let (clean, report) = (&jobs[0].id, &jobs[1].id);
        orchestrator.notifier(clean).unwrap();
        orchestrator.notifier(report).unwrap();
        assert_eq!(tracked(&orchestrator), (2, 2));

        assert_eq!(orchestrator.run_job(clean).unwrap(), JobStatus::Completed);
        assert_eq!(tracked(&orchestrator), (2, 2));

        assert_eq!(orchestrator.run_job(report).unwrap(), JobStatus::Completed);
        assert_eq!(tracked(&orchestrator), (0, 0));

        assert_eq!(orchestrator.job(clean).unwrap().status, JobStatus::Completed);
        assert_eq!(orchestrator.job(report).unwrap().status, JobStatus::Completed);
        assert_eq!(tracked(&orchestrator), (0, 0));
    }

    #[test]
    fn unrelated_submissions_do_not_keep_finished_jobs_alive() {
        let dir = TempDir::new().unwrap();
        let (orchestrator, registry) = orchestrator(&dir);
        let first = orchestrator
            .submit(
                [task(&registry, "clean", &["raw"], &["cleaned"])],
                SubmissionOptions::new(),
            )
            .unwrap();
        orchestrator.run_job(&first[0].id).unwrap();
        assert_eq!(tracked(&orchestrator).0, 0);

        let second = orchestrator
            .submit(
                [task(&registry, "report", &["cleaned"], &["report"])],
                SubmissionOptions::new(),
            )
            .unwrap();
        assert_eq!(second[0].status, JobStatus::Pending);
        assert_eq!(tracked(&orchestrator).0, 1);
    }
}
