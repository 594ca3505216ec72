pub mod callable;
pub mod data_node;
pub mod error;
pub mod ids;
pub mod job;
pub mod status;
pub mod task;

pub use callable::{BoundCallable, CallableKey, CallableRef};
pub use data_node::{DataNode, Edit};
pub use error::{CoreError, CoreErrorKind};
pub use ids::{DataNodeId, JobId, TaskId, generate_submit_id};
pub use job::Job;
pub use status::JobStatus;
pub use task::{DEFAULT_VERSION, Task};
