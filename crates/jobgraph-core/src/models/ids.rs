use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(JobId);
string_id!(TaskId);
string_id!(DataNodeId);

impl JobId {
    pub fn generate(config_id: &str) -> Self {
        Self(format!("JOB_{config_id}_{}", Uuid::new_v4()))
    }
}

impl TaskId {
    pub fn generate(config_id: &str) -> Self {
        Self(format!("TASK_{config_id}_{}", Uuid::new_v4()))
    }
}

pub fn generate_submit_id() -> String {
    format!("SUBMISSION_{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::{JobId, TaskId, generate_submit_id};

    #[test]
    fn generated_ids_embed_config_id_and_are_unique() {
        let first = JobId::generate("clean");
        let second = JobId::generate("clean");
        assert!(first.as_str().starts_with("JOB_clean_"));
        assert_ne!(first, second);
        assert!(TaskId::generate("clean").as_str().starts_with("TASK_clean_"));
        assert!(generate_submit_id().starts_with("SUBMISSION_"));
    }
}
