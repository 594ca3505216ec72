use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoreErrorKind {
    NotFound,
    Deserialization,
    CyclicDependency,
    InvalidInput,
    InvalidTransition,
    Configuration,
    StorageFailure,
    ExecutionFailure,
    Timeout,
    Internal,
}

/// Error surfaced by every layer of the core.
///
/// `entity` names the collection or entity kind the error is about
/// (`"job"`, `"task"`, `"subscriber"`, ...) when one is known.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub kind: CoreErrorKind,
    pub entity: Option<String>,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            entity: None,
            message: message.into(),
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::new(
            CoreErrorKind::NotFound,
            format!("{entity} model '{id}' was not found"),
        )
        .with_entity(entity)
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Deserialization, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::InvalidInput, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::StorageFailure, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::Internal, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == CoreErrorKind::NotFound
    }

    pub fn is_deserialization(&self) -> bool {
        self.kind == CoreErrorKind::Deserialization
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreError, CoreErrorKind};

    #[test]
    fn not_found_carries_entity_and_id() {
        let error = CoreError::not_found("job", "JOB_1");
        assert_eq!(error.kind, CoreErrorKind::NotFound);
        assert_eq!(error.entity.as_deref(), Some("job"));
        assert!(error.message.contains("JOB_1"));
        assert!(error.is_not_found());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let error = CoreError::deserialization("callable 'a::b' is not registered");
        assert_eq!(
            error.to_string(),
            "Deserialization: callable 'a::b' is not registered"
        );
    }
}
