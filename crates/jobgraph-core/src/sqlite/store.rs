use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use serde_json::Value;

use crate::models::CoreError;
use crate::persistence::{
    Collection, MigrationStore, ModelFilter, ModelRecord, PersistenceResult, StorageBackend,
};
use crate::sqlite::migrations::{SqliteMigration, current_schema_version, migration, migrations};

const MIGRATIONS_TABLE: &str = "jobgraph_schema_migrations";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One row per model, keyed by id, with the full document stored as JSON
/// text and the commonly filtered attributes copied into indexed columns.
pub struct SqliteStore {
    database_path: PathBuf,
}

impl SqliteStore {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn planned_migrations(&self, from_version: i64) -> Vec<&'static SqliteMigration> {
        migrations()
            .iter()
            .filter(|entry| entry.version > from_version)
            .collect()
    }

    pub fn migrate_to_latest(&self) -> PersistenceResult<()> {
        self.apply_migration(current_schema_version())
    }

    fn with_connection<T>(
        &self,
        operation_name: &str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let mut connection = open_connection(&self.database_path)
            .map_err(|error| storage_error(operation_name, error))?;
        operation(&mut connection).map_err(|error| storage_error(operation_name, error))
    }
}

impl MigrationStore for SqliteStore {
    fn current_version(&self) -> PersistenceResult<i64> {
        self.with_connection("current_version", |connection| {
            ensure_migrations_table(connection)?;
            read_current_version(connection)
        })
    }

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()> {
        if target_version < 0 || target_version > current_schema_version() {
            return Err(storage_error_text(
                "apply_migration",
                format!("invalid migration target version '{target_version}'"),
            ));
        }

        if target_version > 0 && migration(target_version).is_none() {
            return Err(storage_error_text(
                "apply_migration",
                format!("migration version '{target_version}' is not defined"),
            ));
        }

        self.with_connection("apply_migration", |connection| {
            ensure_migrations_table(connection)?;
            let current_version = read_current_version(connection)?;

            if target_version == current_version {
                // Every statement is IF [NOT] EXISTS, so replaying repairs
                // tables dropped behind the migrations table's back.
                for version in 1..=target_version {
                    let entry = defined_migration(version)?;
                    connection.execute_batch(entry.up_sql)?;
                }
                return Ok(());
            }

            if target_version > current_version {
                for version in (current_version + 1)..=target_version {
                    apply_up_migration(connection, defined_migration(version)?)?;
                }
            } else {
                for version in ((target_version + 1)..=current_version).rev() {
                    apply_down_migration(connection, defined_migration(version)?)?;
                }
            }

            Ok(())
        })
    }
}

impl StorageBackend for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sql"
    }

    fn upsert(&self, collection: Collection, record: &ModelRecord) -> PersistenceResult<()> {
        if record.id.is_empty() {
            return Err(CoreError::invalid_input("model id must not be empty"));
        }
        let schema_version = record.schema_version()?;
        let document = serde_json::to_string(&record.document).map_err(|error| {
            storage_error_text("upsert", format!("failed to encode '{}': {error}", record.id))
        })?;

        self.with_connection("upsert", |connection| {
            ensure_schema_ready(connection)?;
            let table = collection.as_str();
            let columns = indexed_columns(collection);
            let column_list = columns.join(", ");
            let placeholders = (0..columns.len())
                .map(|offset| format!("?{}", offset + 4))
                .collect::<Vec<_>>()
                .join(", ");
            let updates = columns
                .iter()
                .map(|column| format!("{column} = excluded.{column}"))
                .collect::<Vec<_>>()
                .join(",\n    ");

            let sql = format!(
                "
INSERT INTO {table} (id, schema_version, document, {column_list}, updated_at_unix)
VALUES (?1, ?2, ?3, {placeholders}, strftime('%s', 'now'))
ON CONFLICT(id) DO UPDATE SET
    schema_version = excluded.schema_version,
    document = excluded.document,
    {updates},
    updated_at_unix = excluded.updated_at_unix
"
            );

            let mut values = vec![
                SqlValue::Text(record.id.clone()),
                SqlValue::Integer(schema_version),
                SqlValue::Text(document),
            ];
            values.extend(
                columns
                    .iter()
                    .map(|column| column_value(record.field(column))),
            );

            let transaction = connection.transaction()?;
            transaction.execute(&sql, params_from_iter(values))?;
            transaction.commit()?;
            Ok(())
        })
    }

    fn fetch(&self, collection: Collection, id: &str) -> PersistenceResult<ModelRecord> {
        let raw = self.with_connection("fetch", |connection| {
            ensure_schema_ready(connection)?;
            connection
                .query_row(
                    &format!("SELECT document FROM {} WHERE id = ?1", collection.as_str()),
                    [id],
                    |row| row.get::<_, String>(0),
                )
                .optional()
        })?;

        match raw {
            Some(raw) => decode_record(id.to_string(), &raw),
            None => Err(CoreError::not_found(collection.entity_name(), id)),
        }
    }

    fn fetch_all(
        &self,
        collection: Collection,
        filter: Option<&ModelFilter>,
    ) -> PersistenceResult<Vec<ModelRecord>> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for (field, expected) in filter.map(ModelFilter::conditions).unwrap_or_default() {
            if indexed_columns(collection).contains(&field.as_str()) {
                values.push(column_value(Some(expected)));
                clauses.push(format!("{field} IS ?{}", values.len()));
            } else {
                if field.contains('"') {
                    return Err(CoreError::invalid_input(format!(
                        "filter field '{field}' must not contain quotes"
                    )));
                }
                values.push(SqlValue::Text(format!("$.\"{field}\"")));
                let path_index = values.len();
                values.push(json_value(expected));
                clauses.push(format!(
                    "json_extract(document, ?{path_index}) IS ?{}",
                    values.len()
                ));
            }
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let rows = self.with_connection("fetch_all", |connection| {
            ensure_schema_ready(connection)?;
            let mut statement = connection.prepare(&format!(
                "SELECT id, document FROM {} {where_clause} ORDER BY id",
                collection.as_str()
            ))?;
            let rows = statement.query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
        })?;

        rows.into_iter()
            .map(|(id, raw)| decode_record(id, &raw))
            .collect()
    }

    fn remove(&self, collection: Collection, id: &str) -> PersistenceResult<()> {
        let deleted = self.with_connection("remove", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(
                &format!("DELETE FROM {} WHERE id = ?1", collection.as_str()),
                [id],
            )
        })?;

        if deleted == 0 {
            return Err(CoreError::not_found(collection.entity_name(), id));
        }
        Ok(())
    }

    fn remove_all(&self, collection: Collection) -> PersistenceResult<()> {
        self.with_connection("remove_all", |connection| {
            ensure_schema_ready(connection)?;
            connection.execute(&format!("DELETE FROM {}", collection.as_str()), [])?;
            Ok(())
        })
    }
}

fn indexed_columns(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Tasks => &["config_id", "owner_id"],
        Collection::Jobs => &["task_id", "status", "submit_id"],
    }
}

/// Indexed columns hold strings as-is and any other JSON value as JSON text.
fn column_value(value: Option<&Value>) -> SqlValue {
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::String(text)) => SqlValue::Text(text.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

/// Mirror of what `json_extract` yields for each JSON type.
fn json_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn decode_record(id: String, raw: &str) -> PersistenceResult<ModelRecord> {
    let document: Value = serde_json::from_str(raw).map_err(|error| {
        CoreError::deserialization(format!("stored document for '{id}' is not valid JSON: {error}"))
    })?;
    Ok(ModelRecord::new(id, document))
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
    }
    let connection = Connection::open(database_path)?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    Ok(connection)
}

fn ensure_migrations_table(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(&format!(
        "
CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at_unix INTEGER NOT NULL
);
"
    ))?;
    Ok(())
}

fn ensure_schema_ready(connection: &Connection) -> rusqlite::Result<()> {
    ensure_migrations_table(connection)?;
    let version = read_current_version(connection)?;
    if version <= 0 {
        return Err(storage_error_sqlite(
            "database schema is not initialized; apply migrations before model operations",
        ));
    }
    Ok(())
}

fn read_current_version(connection: &Connection) -> rusqlite::Result<i64> {
    connection.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {MIGRATIONS_TABLE}"),
        [],
        |row| row.get(0),
    )
}

fn defined_migration(version: i64) -> rusqlite::Result<&'static SqliteMigration> {
    migration(version).ok_or_else(|| {
        storage_error_sqlite(&format!("migration version '{version}' is not defined"))
    })
}

fn apply_up_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(migration.up_sql)?;
    transaction.execute(
        &format!(
            "INSERT INTO {MIGRATIONS_TABLE} (version, name, applied_at_unix)
             VALUES (?1, ?2, strftime('%s', 'now'))"
        ),
        (migration.version, migration.name),
    )?;
    transaction.commit()?;
    Ok(())
}

fn apply_down_migration(
    connection: &mut Connection,
    migration: &SqliteMigration,
) -> rusqlite::Result<()> {
    let transaction = connection.transaction()?;
    transaction.execute_batch(migration.down_sql)?;
    transaction.execute(
        &format!("DELETE FROM {MIGRATIONS_TABLE} WHERE version = ?1"),
        [migration.version],
    )?;
    transaction.commit()?;
    Ok(())
}

fn storage_error(operation: &str, error: rusqlite::Error) -> CoreError {
    storage_error_text(operation, error.to_string())
}

fn storage_error_sqlite(message: &str) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(message.to_string())))
}

fn storage_error_text(operation: &str, message: impl AsRef<str>) -> CoreError {
    CoreError::storage(format!(
        "sqlite store '{operation}' failed: {}",
        message.as_ref()
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{column_value, json_value};
    use rusqlite::types::Value as SqlValue;

    #[test]
    fn column_values_keep_strings_and_encode_the_rest() {
        assert_eq!(column_value(None), SqlValue::Null);
        assert_eq!(
            column_value(Some(&json!("completed"))),
            SqlValue::Text("completed".to_string())
        );
        assert_eq!(column_value(Some(&json!(3))), SqlValue::Text("3".to_string()));
    }

    #[test]
    fn json_values_follow_json_extract_typing() {
        assert_eq!(json_value(&json!(true)), SqlValue::Integer(1));
        assert_eq!(json_value(&json!(7)), SqlValue::Integer(7));
        assert_eq!(json_value(&json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(json_value(&json!(["a"])), SqlValue::Text("[\"a\"]".to_string()));
    }
}
