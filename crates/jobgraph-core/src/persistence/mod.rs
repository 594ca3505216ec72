pub mod filesystem;

pub use filesystem::FileSystemStore;

use serde_json::Value;

use crate::models::CoreError;

pub type PersistenceResult<T> = Result<T, CoreError>;

pub const SCHEMA_VERSION_FIELD: &str = "schema_version";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Collection {
    Tasks,
    Jobs,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Jobs => "jobs",
        }
    }

    pub fn entity_name(self) -> &'static str {
        match self {
            Self::Tasks => "task",
            Self::Jobs => "job",
        }
    }
}

/// A model as the storage backends see it: an id plus a JSON document.
///
/// The document is a JSON object carrying a `schema_version` field; backends
/// store it verbatim and never interpret anything beyond top-level fields.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelRecord {
    pub id: String,
    pub document: Value,
}

impl ModelRecord {
    pub fn new(id: impl Into<String>, document: Value) -> Self {
        Self {
            id: id.into(),
            document,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.document.get(name)
    }

    /// Documents written before versioning was introduced carry no version field.
    pub fn schema_version(&self) -> PersistenceResult<i64> {
        match self.document.get(SCHEMA_VERSION_FIELD) {
            None | Some(Value::Null) => Ok(1),
            Some(value) => value.as_i64().ok_or_else(|| {
                CoreError::deserialization(format!(
                    "model '{}' has a non-integer schema_version '{value}'",
                    self.id
                ))
            }),
        }
    }
}

/// Conjunction of equality conditions on top-level model fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelFilter {
    conditions: Vec<(String, Value)>,
}

impl ModelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &ModelRecord) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            let actual = record.field(field).unwrap_or(&Value::Null);
            actual == expected
        })
    }
}

/// Uniform CRUD surface over model records, one implementation per storage
/// technology. Every backend reports a missing id as `NotFound`.
pub trait StorageBackend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    fn upsert(&self, collection: Collection, record: &ModelRecord) -> PersistenceResult<()>;

    fn fetch(&self, collection: Collection, id: &str) -> PersistenceResult<ModelRecord>;

    fn fetch_all(
        &self,
        collection: Collection,
        filter: Option<&ModelFilter>,
    ) -> PersistenceResult<Vec<ModelRecord>>;

    fn remove(&self, collection: Collection, id: &str) -> PersistenceResult<()>;

    fn remove_all(&self, collection: Collection) -> PersistenceResult<()>;
}

pub trait MigrationStore: Send + Sync {
    fn current_version(&self) -> PersistenceResult<i64>;

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()>;
}

pub(crate) fn stamp_schema_version(document: Value, version: i64) -> PersistenceResult<Value> {
    match document {
        Value::Object(mut fields) => {
            fields.insert(SCHEMA_VERSION_FIELD.to_string(), Value::from(version));
            Ok(Value::Object(fields))
        }
        other => Err(CoreError::internal(format!(
            "model documents must be JSON objects, got '{other}'"
        ))),
    }
}
