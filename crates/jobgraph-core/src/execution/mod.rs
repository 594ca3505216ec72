use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::models::{CoreError, CoreErrorKind, Job};

pub type ExecutionResult<T> = Result<T, CoreError>;

/// Runs the body of a job's task. Called from a blocking worker thread.
///
/// Any failure, including a panic inside the task function, comes back as an
/// `ExecutionFailure` error; the orchestrator records it on the job.
pub trait TaskExecutor: Send + Sync {
    fn execute(&self, job: &Job) -> ExecutionResult<()>;
}

/// Invokes the task function resolved from the callable registry with the
/// job and the function's bound arguments.
#[derive(Clone, Copy, Debug, Default)]
pub struct RegisteredFunctionExecutor;

impl RegisteredFunctionExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl TaskExecutor for RegisteredFunctionExecutor {
    fn execute(&self, job: &Job) -> ExecutionResult<()> {
        let function = &job.task.function;
        if !function.is_resolved() {
            return Err(execution_failure(
                job,
                format!("task function '{}' is not registered", function.reference()),
            ));
        }

        match catch_unwind(AssertUnwindSafe(|| function.invoke(job))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(execution_failure(
                job,
                format!("task function '{}' failed: {error}", function.reference()),
            )),
            Err(payload) => Err(execution_failure(
                job,
                format!(
                    "task function '{}' panicked: {}",
                    function.reference(),
                    panic_message(payload.as_ref())
                ),
            )),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "non-string panic payload".to_string()
}

fn execution_failure(job: &Job, message: String) -> CoreError {
    CoreError::new(CoreErrorKind::ExecutionFailure, message).with_entity(job.id.to_string())
}
