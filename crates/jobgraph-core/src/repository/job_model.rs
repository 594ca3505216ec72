use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{CallableRef, CoreError, DEFAULT_VERSION, JobStatus};
use crate::persistence::{ModelRecord, PersistenceResult};

/// Subscriber shape written by the first schema generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacySubscriber {
    pub fct_module: String,
    pub fct_name: String,
    #[serde(default)]
    pub fct_params: Vec<Value>,
}

impl From<LegacySubscriber> for CallableRef {
    fn from(legacy: LegacySubscriber) -> Self {
        CallableRef::new(legacy.fct_module, legacy.fct_name).with_arguments(legacy.fct_params)
    }
}

/// First schema generation. Statuses are uppercase names and creation dates
/// may have been written without a UTC offset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobModelV1 {
    pub id: String,
    pub task_id: String,
    pub status: String,
    pub submit_id: String,
    pub creation_date: String,
    #[serde(default)]
    pub subscribers: Vec<LegacySubscriber>,
    #[serde(default)]
    pub stacktrace: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobModelV2 {
    pub id: String,
    pub task_id: String,
    pub status: JobStatus,
    pub force: bool,
    pub submit_id: String,
    pub submit_entity_id: String,
    pub creation_date: DateTime<Utc>,
    pub subscribers: Vec<CallableRef>,
    pub stacktrace: Vec<String>,
    pub version: String,
}

pub type JobModel = JobModelV2;

pub const JOB_SCHEMA_VERSION: i64 = 2;

impl TryFrom<JobModelV1> for JobModelV2 {
    type Error = CoreError;

    fn try_from(legacy: JobModelV1) -> Result<Self, Self::Error> {
        let status = legacy.status.parse::<JobStatus>().map_err(|()| {
            CoreError::deserialization(format!(
                "job model '{}' has unknown status '{}'",
                legacy.id, legacy.status
            ))
            .with_entity("job")
        })?;
        let creation_date = parse_legacy_timestamp(&legacy.creation_date).ok_or_else(|| {
            CoreError::deserialization(format!(
                "job model '{}' has unreadable creation_date '{}'",
                legacy.id, legacy.creation_date
            ))
            .with_entity("job")
        })?;

        Ok(Self {
            submit_entity_id: legacy.submit_id.clone(),
            id: legacy.id,
            task_id: legacy.task_id,
            status,
            force: false,
            submit_id: legacy.submit_id,
            creation_date,
            subscribers: legacy.subscribers.into_iter().map(Into::into).collect(),
            stacktrace: legacy.stacktrace,
            version: DEFAULT_VERSION.to_string(),
        })
    }
}

/// Timestamps without an offset are taken to be UTC.
fn parse_legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Clone, Debug, PartialEq)]
pub enum VersionedJobModel {
    V1(JobModelV1),
    V2(JobModelV2),
}

impl VersionedJobModel {
    pub fn from_record(record: &ModelRecord) -> PersistenceResult<Self> {
        let document = record.document.clone();
        let model = match record.schema_version()? {
            1 => serde_json::from_value(document).map(Self::V1),
            2 => serde_json::from_value(document).map(Self::V2),
            other => {
                return Err(CoreError::deserialization(format!(
                    "job model '{}' has unsupported schema_version {other}",
                    record.id
                ))
                .with_entity("job"));
            }
        };
        model.map_err(|error| {
            CoreError::deserialization(format!("job model '{}' is malformed: {error}", record.id))
                .with_entity("job")
        })
    }

    pub fn into_current(self) -> PersistenceResult<JobModel> {
        match self {
            Self::V1(model) => model.try_into(),
            Self::V2(model) => Ok(model),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{VersionedJobModel, parse_legacy_timestamp};
    use crate::models::JobStatus;
    use crate::persistence::ModelRecord;

    fn legacy_record(status: &str, creation_date: &str) -> ModelRecord {
        ModelRecord::new(
            "JOB_clean_1",
            json!({
                "id": "JOB_clean_1",
                "task_id": "TASK_clean_1",
                "status": status,
                "submit_id": "SUBMISSION_1",
                "creation_date": creation_date,
                "subscribers": [
                    {"fct_module": "app.notify", "fct_name": "log_status", "fct_params": ["ops"]}
                ],
                "stacktrace": ["boom"]
            }),
        )
    }

    #[test]
    fn legacy_job_upgrades_with_defaults() {
        let current = VersionedJobModel::from_record(&legacy_record("COMPLETED", "2023-04-01T10:30:00"))
            .unwrap()
            .into_current()
            .unwrap();

        assert_eq!(current.status, JobStatus::Completed);
        assert!(!current.force);
        assert_eq!(current.submit_entity_id, "SUBMISSION_1");
        assert_eq!(current.version, "latest");
        assert_eq!(
            current.creation_date,
            Utc.with_ymd_and_hms(2023, 4, 1, 10, 30, 0).unwrap()
        );
        assert_eq!(current.subscribers[0].qualified_name, "log_status");
        assert_eq!(current.subscribers[0].bound_arguments, vec![json!("ops")]);
        assert_eq!(current.stacktrace, vec!["boom".to_string()]);
    }

    #[test]
    fn legacy_status_must_be_known() {
        let error = VersionedJobModel::from_record(&legacy_record("EXPLODED", "2023-04-01T10:30:00"))
            .unwrap()
            .into_current()
            .unwrap_err();
        assert!(error.is_deserialization());
    }

    #[test]
    fn offsets_are_honoured_when_present() {
        assert_eq!(
            parse_legacy_timestamp("2023-04-01T12:30:00+02:00"),
            Some(Utc.with_ymd_and_hms(2023, 4, 1, 10, 30, 0).unwrap())
        );
        assert_eq!(parse_legacy_timestamp("yesterday"), None);
    }
}
