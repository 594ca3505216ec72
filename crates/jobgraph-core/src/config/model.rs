use std::path::PathBuf;

use serde::Deserialize;

use crate::models::DEFAULT_VERSION;
use crate::registry::ResolutionPolicy;

/// Top-level TOML document. Only the `[core]` table is read.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub core: CoreConfig,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    #[default]
    Filesystem,
    Sql,
}

impl RepositoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filesystem => "filesystem",
            Self::Sql => "sql",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub repository_type: RepositoryType,
    pub storage_folder: PathBuf,
    pub sql_database: PathBuf,
    pub max_workers: usize,
    pub unresolved_callables: ResolutionPolicy,
    pub version: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            repository_type: RepositoryType::Filesystem,
            storage_folder: PathBuf::from(".jobgraph"),
            sql_database: PathBuf::from(".jobgraph/jobgraph.sqlite3"),
            max_workers: 2,
            unresolved_callables: ResolutionPolicy::Placeholder,
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

impl CoreConfig {
    /// Root both backends under `folder`, keeping every other setting.
    pub fn with_storage_root(mut self, folder: impl Into<PathBuf>) -> Self {
        let folder = folder.into();
        self.sql_database = folder.join("jobgraph.sqlite3");
        self.storage_folder = folder;
        self
    }

    pub fn with_repository_type(mut self, repository_type: RepositoryType) -> Self {
        self.repository_type = repository_type;
        self
    }
}
