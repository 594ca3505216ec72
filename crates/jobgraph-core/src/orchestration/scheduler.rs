//! Dependency-aware partitioning of waiting jobs.
//!
//! Task B depends on task A when an output data node of A is an input data
//! node of B. Within one submission that relation decides which jobs wait for
//! which; across submissions only the data node edit history matters.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::models::{CoreError, CoreErrorKind, DataNodeId, Job, JobId, JobStatus, Task};
use crate::orchestration::{DataNodeCatalog, OrchestrationResult};

/// Order `tasks` so that every producer precedes its consumers.
///
/// Returns indices into `tasks`. A cycle, including a task consuming its own
/// output, is a `CyclicDependency` error.
pub fn topological_order(tasks: &[Task]) -> OrchestrationResult<Vec<usize>> {
    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for index in 0..tasks.len() {
        graph.add_node(index);
    }

    for (downstream_index, downstream) in tasks.iter().enumerate() {
        for (upstream_index, upstream) in tasks.iter().enumerate() {
            if !downstream.consumes_outputs_of(upstream) {
                continue;
            }
            if upstream_index == downstream_index {
                return Err(cycle_error(downstream));
            }
            graph.add_edge(upstream_index, downstream_index, ());
        }
    }

    toposort(&graph, None).map_err(|cycle| cycle_error(&tasks[cycle.node_id()]))
}

fn cycle_error(task: &Task) -> CoreError {
    CoreError::new(
        CoreErrorKind::CyclicDependency,
        format!(
            "dependency cycle detected involving task '{}' (config '{}')",
            task.id, task.config_id
        ),
    )
    .with_entity("task")
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Readiness {
    Ready,
    Waiting,
    /// An upstream job of the same submission ended without completing.
    Dead { upstream: JobId },
}

/// One status change the scheduler wants applied.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SchedulerStep {
    pub job_id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Everything a scheduling decision reads.
pub struct SchedulingView<'a> {
    /// Every job the orchestrator currently tracks.
    pub jobs: &'a [Job],
    /// Data nodes written by at least one known task.
    pub producers: &'a HashSet<DataNodeId>,
    pub catalog: &'a dyn DataNodeCatalog,
    pub now: DateTime<Utc>,
}

impl SchedulingView<'_> {
    fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| &job.id == id)
    }
}

pub fn evaluate(job: &Job, view: &SchedulingView<'_>) -> OrchestrationResult<Readiness> {
    let mut waiting = false;

    for input in &job.task.input_ids {
        let upstream = view.jobs.iter().filter(|other| {
            other.id != job.id
                && other.submit_id == job.submit_id
                && other.task.output_ids.contains(input)
        });

        let mut upstream_pending = false;
        for producer in upstream {
            if producer.status.is_unsuccessful() {
                return Ok(Readiness::Dead {
                    upstream: producer.id.clone(),
                });
            }
            upstream_pending |= !producer.status.is_terminal();
        }
        if upstream_pending {
            waiting = true;
            continue;
        }

        if job.force || !view.producers.contains(input) {
            continue;
        }
        if !input_is_fresh(input, view)? {
            waiting = true;
        }
    }

    Ok(if waiting {
        Readiness::Waiting
    } else {
        Readiness::Ready
    })
}

/// The last edit must be fresh and, when it names a job this orchestrator
/// tracks, that job must have completed.
fn input_is_fresh(input: &DataNodeId, view: &SchedulingView<'_>) -> OrchestrationResult<bool> {
    let Some(node) = view.catalog.data_node(input)? else {
        return Ok(false);
    };
    let Some(edit) = node.last_edit() else {
        return Ok(false);
    };

    if let Some(producer) = edit.job_id.as_ref().and_then(|id| view.job(id))
        && producer.status != JobStatus::Completed
    {
        return Ok(false);
    }

    Ok(node.is_fresh(view.now))
}

/// Decide the next status of every `SUBMITTED` or `BLOCKED` job, in
/// submission order. Jobs whose status would not change are left out.
pub fn plan(view: &SchedulingView<'_>) -> OrchestrationResult<Vec<SchedulerStep>> {
    let mut candidates = view
        .jobs
        .iter()
        .filter(|job| matches!(job.status, JobStatus::Submitted | JobStatus::Blocked))
        .collect::<Vec<_>>();
    candidates.sort_by(|left, right| left.submission_order().cmp(&right.submission_order()));

    let mut steps = Vec::new();
    for job in candidates {
        let next = match evaluate(job, view)? {
            Readiness::Ready => JobStatus::Pending,
            Readiness::Waiting => JobStatus::Blocked,
            Readiness::Dead { upstream } => {
                tracing::debug!(
                    job_id = %job.id,
                    upstream_job_id = %upstream,
                    "upstream job did not complete; skipping"
                );
                JobStatus::Skipped
            }
        };
        if next != job.status {
            steps.push(SchedulerStep {
                job_id: job.id.clone(),
                from: job.status,
                to: next,
            });
        }
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{DateTime, TimeDelta, Utc};

    use super::{Readiness, SchedulingView, evaluate, plan, topological_order};
    use crate::models::{
        BoundCallable, CallableRef, CoreErrorKind, DataNode, DataNodeId, Edit, Job, JobId,
        JobStatus, Task,
    };
    use crate::orchestration::InMemoryDataNodeCatalog;

    fn task(config_id: &str, inputs: &[&str], outputs: &[&str]) -> Task {
        Task::new(
            config_id,
            BoundCallable::placeholder(CallableRef::new("pipeline", config_id)),
        )
        .with_id(format!("TASK_{config_id}"))
        .with_inputs(inputs.iter().copied())
        .with_outputs(outputs.iter().copied())
    }

    fn job(task: Task, status: JobStatus) -> Job {
        let mut job = Job::new(
            JobId::new(format!("JOB_{}", task.config_id)),
            task,
            "SUBMISSION_1",
            "SUBMISSION_1",
        );
        job.status = status;
        job
    }

    fn producers(ids: &[&str]) -> HashSet<DataNodeId> {
        ids.iter().copied().map(DataNodeId::from).collect()
    }

    #[test]
    fn producers_come_before_consumers() {
        let tasks = vec![
            task("report", &["cleaned"], &["report"]),
            task("clean", &["raw"], &["cleaned"]),
        ];
        assert_eq!(topological_order(&tasks).unwrap(), vec![1, 0]);
    }

    #[test]
    fn cycles_are_rejected() {
        let tasks = vec![task("a", &["y"], &["x"]), task("b", &["x"], &["y"])];
        let error = topological_order(&tasks).unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::CyclicDependency);

        let own_output = vec![task("loop", &["x"], &["x"])];
        let error = topological_order(&own_output).unwrap_err();
        assert_eq!(error.kind, CoreErrorKind::CyclicDependency);
        assert!(error.message.contains("TASK_loop"));
    }

    #[test]
    fn consumer_waits_for_running_upstream_and_dies_with_failed_one() {
        let catalog = InMemoryDataNodeCatalog::new();
        let producers = producers(&["cleaned"]);
        let consumer = job(task("report", &["cleaned"], &["report"]), JobStatus::Blocked);

        let running = [
            job(task("clean", &[], &["cleaned"]), JobStatus::Running),
            consumer.clone(),
        ];
        let view = SchedulingView {
            jobs: &running,
            producers: &producers,
            catalog: &catalog,
            now: Utc::now(),
        };
        assert_eq!(evaluate(&consumer, &view).unwrap(), Readiness::Waiting);

        let failed = [
            job(task("clean", &[], &["cleaned"]), JobStatus::Failed),
            consumer.clone(),
        ];
        let view = SchedulingView {
            jobs: &failed,
            ..view
        };
        assert_eq!(
            evaluate(&consumer, &view).unwrap(),
            Readiness::Dead {
                upstream: JobId::from("JOB_clean")
            }
        );
    }

    #[test]
    fn stale_input_blocks_unless_forced() {
        let catalog = InMemoryDataNodeCatalog::new();
        catalog
            .insert(
                DataNode::new("cleaned")
                    .with_validity_period(TimeDelta::hours(1))
                    .with_edit(Edit::manual(Utc::now() - TimeDelta::hours(2))),
            )
            .unwrap();
        let producers = producers(&["cleaned"]);
        let mut consumer = job(task("report", &["cleaned"], &["report"]), JobStatus::Submitted);

        let jobs = [consumer.clone()];
        let view = SchedulingView {
            jobs: &jobs,
            producers: &producers,
            catalog: &catalog,
            now: Utc::now(),
        };
        assert_eq!(evaluate(&consumer, &view).unwrap(), Readiness::Waiting);

        consumer.force = true;
        assert_eq!(evaluate(&consumer, &view).unwrap(), Readiness::Ready);
    }

    #[test]
    fn inputs_nobody_produces_are_always_ready() {
        let catalog = InMemoryDataNodeCatalog::new();
        let producers = producers(&[]);
        let jobs = [job(task("clean", &["raw"], &["cleaned"]), JobStatus::Submitted)];
        let view = SchedulingView {
            jobs: &jobs,
            producers: &producers,
            catalog: &catalog,
            now: Utc::now(),
        };

        let steps = plan(&view).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].to, JobStatus::Pending);
    }

    #[test]
    fn completed_upstream_edit_unblocks_consumer() {
        let catalog = InMemoryDataNodeCatalog::new();
        catalog
            .insert(
                DataNode::new("cleaned").with_edit(Edit::by_job(JobId::from("JOB_clean"), Utc::now())),
            )
            .unwrap();
        let producers = producers(&["cleaned"]);
        let jobs = [
            job(task("clean", &[], &["cleaned"]), JobStatus::Completed),
            job(task("report", &["cleaned"], &["report"]), JobStatus::Blocked),
        ];
        let view = SchedulingView {
            jobs: &jobs,
            producers: &producers,
            catalog: &catalog,
            now: Utc::now(),
        };

        let steps = plan(&view).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].job_id, JobId::from("JOB_report"));
        assert_eq!(steps[0].from, JobStatus::Blocked);
        assert_eq!(steps[0].to, JobStatus::Pending);
    }

    fn submitted(config_id: &str, submit_id: &str, creation_date: DateTime<Utc>) -> Job {
        let mut job = job(task(config_id, &[], &[config_id]), JobStatus::Submitted);
        job.submit_id = submit_id.to_string();
        job.creation_date = creation_date;
        job
    }

    #[test]
    fn steps_follow_submission_order() {
        let catalog = InMemoryDataNodeCatalog::new();
        let producers = producers(&[]);
        let earlier = Utc::now();
        let later = earlier + TimeDelta::seconds(1);
        let jobs = [
            submitted("d", "SUBMISSION_a", later),
            submitted("a", "SUBMISSION_b", earlier),
            submitted("c", "SUBMISSION_a", later),
            submitted("b", "SUBMISSION_a", earlier),
        ];
        let view = SchedulingView {
            jobs: &jobs,
            producers: &producers,
            catalog: &catalog,
            now: Utc::now(),
        };

        let order = plan(&view)
            .unwrap()
            .into_iter()
            .map(|step| step.job_id.as_str().to_string())
            .collect::<Vec<_>>();
        assert_eq!(order, ["JOB_b", "JOB_a", "JOB_c", "JOB_d"]);
    }
}
