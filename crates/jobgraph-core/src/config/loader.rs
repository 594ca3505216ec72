use std::fs;
use std::path::Path;

use crate::config::model::{ConfigFile, CoreConfig};
use crate::models::{CoreError, CoreErrorKind};

pub type ConfigResult<T> = Result<T, CoreError>;

/// Read and deserialize a TOML config file without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> ConfigResult<CoreConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|error| {
        configuration_error(format!("reading config file at {}: {error}", path.display()))
    })?;

    let file: ConfigFile = toml::from_str(&contents).map_err(|error| {
        configuration_error(format!("parsing TOML config from {}: {error}", path.display()))
    })?;

    Ok(file.core)
}

pub fn load_and_validate(path: impl AsRef<Path>) -> ConfigResult<CoreConfig> {
    let config = load_from_path(path)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &CoreConfig) -> ConfigResult<()> {
    if config.max_workers == 0 {
        return Err(configuration_error(
            "[core].max_workers must be >= 1 (got 0)",
        ));
    }
    if config.version.trim().is_empty() {
        return Err(configuration_error("[core].version must not be empty"));
    }
    if config.storage_folder.as_os_str().is_empty() {
        return Err(configuration_error("[core].storage_folder must not be empty"));
    }
    if config.sql_database.as_os_str().is_empty() {
        return Err(configuration_error("[core].sql_database must not be empty"));
    }
    Ok(())
}

fn configuration_error(message: impl Into<String>) -> CoreError {
    CoreError::new(CoreErrorKind::Configuration, message).with_entity("config")
}
