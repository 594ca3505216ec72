use std::sync::{Arc, Mutex};

use jobgraph_core::config::{CoreConfig, RepositoryType};
use jobgraph_core::models::{CoreErrorKind, Job, JobId, JobStatus, Task};
use jobgraph_core::persistence::ModelFilter;
use jobgraph_core::registry::{CallableRegistry, ResolutionPolicy};
use jobgraph_core::repository::RepositoryFactory;
use serde_json::json;
use tempfile::TempDir;

const SUBSCRIBER_NAMES: [&str; 5] = ["f", "A.f", "A.g", "A.h", "A.B.f"];

fn registry(calls: Arc<Mutex<Vec<String>>>) -> Arc<CallableRegistry> {
    let mut registry = CallableRegistry::new();
    registry
        .register_task_function("pipeline.steps", "clean", |_, _| Ok(()))
        .unwrap();
    for name in SUBSCRIBER_NAMES {
        let calls = calls.clone();
        registry
            .register_subscriber("tests.subscribers", name, move |job, _| {
                calls
                    .lock()
                    .unwrap()
                    .push(format!("{name}:{}", job.status.as_str()));
                Ok(())
            })
            .unwrap();
    }
    Arc::new(registry)
}

fn factory(
    dir: &TempDir,
    repository_type: RepositoryType,
    registry: Arc<CallableRegistry>,
) -> RepositoryFactory {
    let config = CoreConfig::default()
        .with_storage_root(dir.path())
        .with_repository_type(repository_type);
    RepositoryFactory::from_config(&config, registry).unwrap()
}

fn sample_job(registry: &CallableRegistry) -> Job {
    let task = Task::new(
        "clean",
        registry
            .task_function("pipeline.steps", "clean", [json!("strict")])
            .unwrap(),
    )
    .with_owner("scenario_1")
    .with_property("retries", 3)
    .with_inputs(["raw"])
    .with_outputs(["cleaned", "rejected"]);

    let mut job = Job::new(JobId::generate("clean"), task, "SUBMISSION_1", "scenario_1");
    job.force = true;
    job.status = JobStatus::Blocked;
    job.stacktrace.push("earlier failure".to_string());
    for name in SUBSCRIBER_NAMES {
        job.subscribe(
            registry
                .subscriber("tests.subscribers", name, [json!(name)])
                .unwrap(),
        );
    }
    job
}

#[test]
fn save_then_load_yields_an_equal_job_on_every_backend() {
    for repository_type in [RepositoryType::Filesystem, RepositoryType::Sql] {
        let dir = TempDir::new().unwrap();
        let registry = registry(Arc::default());
        let repositories = factory(&dir, repository_type, registry.clone());
        let job = sample_job(&registry);

        repositories.task_repository().save(&job.task).unwrap();
        let jobs = repositories.job_repository();
        jobs.save(&job).unwrap();
        jobs.save(&job).unwrap();

        let loaded = jobs.load(job.id.as_str()).unwrap();
        assert_eq!(loaded, job, "backend {}", repository_type.as_str());
        assert!(jobs.exists(job.id.as_str()).unwrap());
    }
}

#[test]
fn both_backends_produce_identical_entities() {
    let registry = registry(Arc::default());
    let job = sample_job(&registry);

    let loaded = [RepositoryType::Filesystem, RepositoryType::Sql].map(|repository_type| {
        let dir = TempDir::new().unwrap();
        let repositories = factory(&dir, repository_type, registry.clone());
        repositories.task_repository().save(&job.task).unwrap();
        repositories.job_repository().save(&job).unwrap();
        repositories.job_repository().load(job.id.as_str()).unwrap()
    });

    assert_eq!(loaded[0], loaded[1]);
}

#[test]
fn reloaded_subscribers_run_in_their_original_order() {
    let dir = TempDir::new().unwrap();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let registry = registry(calls.clone());
    let repositories = factory(&dir, RepositoryType::Sql, registry.clone());
    let job = sample_job(&registry);
    repositories.task_repository().save(&job.task).unwrap();
    repositories.job_repository().save(&job).unwrap();

    let loaded = repositories.job_repository().load(job.id.as_str()).unwrap();
    for subscriber in &loaded.subscribers {
        subscriber.invoke(&loaded).unwrap();
        assert_eq!(subscriber.reference().bound_arguments.len(), 1);
    }

    let expected = SUBSCRIBER_NAMES
        .iter()
        .map(|name| format!("{name}:blocked"))
        .collect::<Vec<_>>();
    assert_eq!(*calls.lock().unwrap(), expected);
}

#[test]
fn loading_an_unknown_id_is_not_found() {
    let dir = TempDir::new().unwrap();
    let repositories = factory(&dir, RepositoryType::Filesystem, registry(Arc::default()));

    let error = repositories.job_repository().load("JOB_never_saved").unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::NotFound);
    assert!(!repositories.job_repository().exists("JOB_never_saved").unwrap());
}

#[test]
fn job_whose_task_was_deleted_fails_cleanly() {
    for repository_type in [RepositoryType::Filesystem, RepositoryType::Sql] {
        let dir = TempDir::new().unwrap();
        let registry = registry(Arc::default());
        let repositories = factory(&dir, repository_type, registry.clone());
        let job = sample_job(&registry);
        repositories.task_repository().save(&job.task).unwrap();
        repositories.job_repository().save(&job).unwrap();

        repositories.task_repository().delete(job.task.id.as_str()).unwrap();

        let error = repositories.job_repository().load(job.id.as_str()).unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::NotFound);
        assert_eq!(error.entity.as_deref(), Some("task"));
    }
}

#[test]
fn unresolved_subscriber_follows_the_configured_policy() {
    let dir = TempDir::new().unwrap();
    let full = registry(Arc::default());
    let job = sample_job(&full);
    let repositories = factory(&dir, RepositoryType::Filesystem, full);
    repositories.task_repository().save(&job.task).unwrap();
    repositories.job_repository().save(&job).unwrap();

    let mut partial = CallableRegistry::new();
    partial
        .register_task_function("pipeline.steps", "clean", |_, _| Ok(()))
        .unwrap();
    partial
        .register_subscriber("tests.subscribers", "f", |_, _| Ok(()))
        .unwrap();
    let partial = Arc::new(partial);

    let lenient = factory(&dir, RepositoryType::Filesystem, partial.clone());
    let loaded = lenient.job_repository().load(job.id.as_str()).unwrap();
    assert_eq!(loaded.subscribers.len(), 5);
    assert!(loaded.subscribers[0].is_resolved());
    assert_eq!(loaded.unresolved_subscribers().len(), 4);
    assert_eq!(loaded.unresolved_subscribers()[0].qualified_name, "A.f");
    assert_eq!(loaded.stacktrace, job.stacktrace);

    lenient.job_repository().save(&loaded).unwrap();
    let strict_config = CoreConfig {
        unresolved_callables: ResolutionPolicy::Fail,
        ..CoreConfig::default().with_storage_root(dir.path())
    };
    let strict = RepositoryFactory::from_config(&strict_config, partial).unwrap();
    let error = strict.job_repository().load(job.id.as_str()).unwrap_err();
    assert_eq!(error.kind, CoreErrorKind::Deserialization);
    assert!(error.message.contains("tests.subscribers::A.f"));
}

#[test]
fn load_all_filters_and_delete_all_clears() {
    let dir = TempDir::new().unwrap();
    let registry = registry(Arc::default());
    let repositories = factory(&dir, RepositoryType::Sql, registry.clone());
    let jobs = repositories.job_repository();

    let first = sample_job(&registry);
    let mut second = sample_job(&registry);
    second.status = JobStatus::Completed;
    for job in [&first, &second] {
        repositories.task_repository().save(&job.task).unwrap();
        jobs.save(job).unwrap();
    }

    let completed = jobs
        .load_all(Some(&ModelFilter::new().eq("status", "completed")))
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, second.id);
    assert_eq!(jobs.load_all(None).unwrap().len(), 2);

    let owned = repositories
        .task_repository()
        .load_all(Some(&ModelFilter::new().eq("owner_id", "scenario_1")))
        .unwrap();
    assert_eq!(owned.len(), 2);

    jobs.delete(first.id.as_str()).unwrap();
    assert!(jobs.load(first.id.as_str()).unwrap_err().is_not_found());
    jobs.delete_all().unwrap();
    assert!(jobs.load_all(None).unwrap().is_empty());
}
