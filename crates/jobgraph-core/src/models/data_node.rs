use chrono::{DateTime, TimeDelta, Utc};

use crate::models::{DataNodeId, JobId};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Edit {
    pub timestamp: DateTime<Utc>,
    pub job_id: Option<JobId>,
}

impl Edit {
    pub fn by_job(job_id: JobId, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            job_id: Some(job_id),
        }
    }

    pub fn manual(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            job_id: None,
        }
    }
}

/// The slice of a data node the core needs: identity, validity and edit history.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataNode {
    pub id: DataNodeId,
    pub validity_period: Option<TimeDelta>,
    pub edits: Vec<Edit>,
}

impl DataNode {
    pub fn new(id: impl Into<DataNodeId>) -> Self {
        Self {
            id: id.into(),
            validity_period: None,
            edits: Vec::new(),
        }
    }

    pub fn with_validity_period(mut self, validity_period: TimeDelta) -> Self {
        self.validity_period = Some(validity_period);
        self
    }

    pub fn with_edit(mut self, edit: Edit) -> Self {
        self.edits.push(edit);
        self
    }

    pub fn last_edit(&self) -> Option<&Edit> {
        self.edits.last()
    }

    /// A node with no validity period never expires; a node never written is never fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let Some(edit) = self.last_edit() else {
            return false;
        };
        match self.validity_period {
            Some(period) => now.signed_duration_since(edit.timestamp) <= period,
            None => true,
        }
    }
}
