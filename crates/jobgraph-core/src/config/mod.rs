//! Runtime configuration read from a TOML file.
//!
//! The loaded [`CoreConfig`] is passed explicitly to the repository factory
//! and the orchestrator; nothing here holds process-wide state.

pub mod loader;
pub mod model;

pub use loader::{load_and_validate, load_from_path, validate_config};
pub use model::{ConfigFile, CoreConfig, RepositoryType};
