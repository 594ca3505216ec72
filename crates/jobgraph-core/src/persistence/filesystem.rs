use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::models::CoreError;
use crate::persistence::{Collection, ModelFilter, ModelRecord, PersistenceResult, StorageBackend};

const RECORD_EXTENSION: &str = "json";

/// One JSON file per model under `<root>/<collection>/<encoded id>.json`.
///
/// Ids are percent-encoded into file names: ASCII letters, digits, `_` and `-`
/// are kept, every other byte becomes `%XX`. Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers only ever see complete records.
pub struct FileSystemStore {
    root: PathBuf,
}

impl FileSystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.as_str())
    }

    fn record_path(&self, collection: Collection, id: &str) -> PersistenceResult<PathBuf> {
        if id.is_empty() {
            return Err(CoreError::invalid_input("model id must not be empty"));
        }
        Ok(self
            .collection_dir(collection)
            .join(format!("{}.{RECORD_EXTENSION}", encode_id(id))))
    }
}

impl StorageBackend for FileSystemStore {
    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    fn upsert(&self, collection: Collection, record: &ModelRecord) -> PersistenceResult<()> {
        let path = self.record_path(collection, &record.id)?;
        let directory = self.collection_dir(collection);
        fs::create_dir_all(&directory).map_err(|error| io_error("upsert", &directory, error))?;

        let payload = serde_json::to_vec_pretty(&record.document).map_err(|error| {
            CoreError::storage(format!("failed to encode model '{}': {error}", record.id))
        })?;

        let mut staged =
            NamedTempFile::new_in(&directory).map_err(|error| io_error("upsert", &directory, error))?;
        staged
            .write_all(&payload)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|error| io_error("upsert", staged.path(), error))?;
        staged
            .persist(&path)
            .map_err(|error| io_error("upsert", &path, error.error))?;
        Ok(())
    }

    fn fetch(&self, collection: Collection, id: &str) -> PersistenceResult<ModelRecord> {
        let path = self.record_path(collection, id)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(CoreError::not_found(collection.entity_name(), id));
            }
            Err(error) => return Err(io_error("fetch", &path, error)),
        };
        decode_record(id, &raw)
    }

    fn fetch_all(
        &self,
        collection: Collection,
        filter: Option<&ModelFilter>,
    ) -> PersistenceResult<Vec<ModelRecord>> {
        let directory = self.collection_dir(collection);
        let entries = match fs::read_dir(&directory) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(io_error("fetch_all", &directory, error)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|error| io_error("fetch_all", &directory, error))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_id)
            else {
                continue;
            };
            let raw = match fs::read(&path) {
                Ok(raw) => raw,
                // Deleted between listing and reading.
                Err(error) if error.kind() == ErrorKind::NotFound => continue,
                Err(error) => return Err(io_error("fetch_all", &path, error)),
            };
            let record = decode_record(&id, &raw)?;
            if filter.is_none_or(|filter| filter.matches(&record)) {
                records.push(record);
            }
        }

        records.sort_by(|left, right| left.id.cmp(&right.id));
        Ok(records)
    }

    fn remove(&self, collection: Collection, id: &str) -> PersistenceResult<()> {
        let path = self.record_path(collection, id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                Err(CoreError::not_found(collection.entity_name(), id))
            }
            Err(error) => Err(io_error("remove", &path, error)),
        }
    }

    fn remove_all(&self, collection: Collection) -> PersistenceResult<()> {
        let directory = self.collection_dir(collection);
        match fs::remove_dir_all(&directory) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(io_error("remove_all", &directory, error)),
        }
    }
}

fn decode_record(id: &str, raw: &[u8]) -> PersistenceResult<ModelRecord> {
    let document: Value = serde_json::from_slice(raw).map_err(|error| {
        CoreError::deserialization(format!("model file for '{id}' is not valid JSON: {error}"))
    })?;
    Ok(ModelRecord::new(id, document))
}

fn encode_id(id: &str) -> String {
    let mut encoded = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

/// Inverse of [`encode_id`]; `None` for names this store did not write.
fn decode_id(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'%' => {
                let hex = name.get(index + 1..index + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                index += 3;
            }
            byte if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' => {
                decoded.push(byte);
                index += 1;
            }
            _ => return None,
        }
    }
    if decoded.is_empty() {
        return None;
    }
    String::from_utf8(decoded).ok()
}

fn io_error(operation: &str, path: &Path, error: std::io::Error) -> CoreError {
    CoreError::storage(format!(
        "filesystem store '{operation}' failed for '{}': {error}",
        path.display()
    ))
}
