//! Explicit registry of callables that can be referenced from stored models.
//!
//! Subscribers and task functions are registered once at process start under a
//! stable `(module_path, qualified_name)` key. Stored models only ever carry that
//! key plus bound arguments; loading resolves the key against this registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::models::{BoundCallable, CallableKey, CallableRef, CoreError, CoreErrorKind, Job};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type CallbackResult = Result<(), BoxError>;

pub type Callback = Arc<dyn Fn(&Job, &[Value]) -> CallbackResult + Send + Sync>;

pub type RegistryResult<T> = Result<T, CoreError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CallableKind {
    Subscriber,
    TaskFunction,
}

impl CallableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscriber => "subscriber",
            Self::TaskFunction => "task function",
        }
    }
}

/// What the converter does with a stored reference the registry cannot resolve.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Load the entity with a no-op placeholder in place of the callable.
    #[default]
    Placeholder,
    /// Fail the whole load with a `Deserialization` error.
    Fail,
}

#[derive(Default)]
pub struct CallableRegistry {
    entries: HashMap<(CallableKind, CallableKey), Callback>,
    aliases: HashMap<(CallableKind, CallableKey), CallableKey>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_subscriber<F>(
        &mut self,
        module_path: &str,
        qualified_name: &str,
        callback: F,
    ) -> RegistryResult<CallableKey>
    where
        F: Fn(&Job, &[Value]) -> CallbackResult + Send + Sync + 'static,
    {
        self.register(
            CallableKind::Subscriber,
            CallableKey::new(module_path, qualified_name),
            Arc::new(callback),
        )
    }

    pub fn register_task_function<F>(
        &mut self,
        module_path: &str,
        qualified_name: &str,
        function: F,
    ) -> RegistryResult<CallableKey>
    where
        F: Fn(&Job, &[Value]) -> CallbackResult + Send + Sync + 'static,
    {
        self.register(
            CallableKind::TaskFunction,
            CallableKey::new(module_path, qualified_name),
            Arc::new(function),
        )
    }

    pub fn register(
        &mut self,
        kind: CallableKind,
        key: CallableKey,
        callback: Callback,
    ) -> RegistryResult<CallableKey> {
        let slot = (kind, key.clone());
        if self.entries.contains_key(&slot) || self.aliases.contains_key(&slot) {
            return Err(CoreError::invalid_input(format!(
                "duplicate {} registration for '{key}'",
                kind.as_str()
            )));
        }
        self.entries.insert(slot, callback);
        Ok(key)
    }

    /// Make references stored under `previous` resolve to the callable
    /// currently registered under `current`.
    pub fn alias(
        &mut self,
        kind: CallableKind,
        previous: CallableKey,
        current: CallableKey,
    ) -> RegistryResult<()> {
        if !self.entries.contains_key(&(kind, current.clone())) {
            return Err(CoreError::invalid_input(format!(
                "cannot alias '{previous}' to unregistered {} '{current}'",
                kind.as_str()
            )));
        }
        let slot = (kind, previous.clone());
        if self.entries.contains_key(&slot) {
            return Err(CoreError::invalid_input(format!(
                "'{previous}' is already registered and cannot be an alias"
            )));
        }
        self.aliases.insert(slot, current);
        Ok(())
    }

    pub fn contains(&self, kind: CallableKind, key: &CallableKey) -> bool {
        self.canonical_key(kind, key).is_some()
    }

    /// Resolve a stored reference into a live callable.
    ///
    /// A reference found through an alias comes back rewritten to the
    /// current key, so saving the entity again stores the new location.
    pub fn resolve(&self, kind: CallableKind, reference: &CallableRef) -> RegistryResult<BoundCallable> {
        let key = reference.key();
        let canonical = self.canonical_key(kind, &key).ok_or_else(|| {
            CoreError::new(
                CoreErrorKind::Deserialization,
                format!("{} '{key}' is not registered", kind.as_str()),
            )
            .with_entity(kind.as_str())
        })?;

        let callback = self
            .entries
            .get(&(kind, canonical.clone()))
            .cloned()
            .ok_or_else(|| CoreError::internal(format!("registry entry for '{canonical}' vanished")))?;

        let resolved_reference = CallableRef {
            module_path: canonical.module_path,
            qualified_name: canonical.qualified_name,
            bound_arguments: reference.bound_arguments.clone(),
        };
        Ok(BoundCallable::resolved(resolved_reference, callback))
    }

    pub fn subscriber(
        &self,
        module_path: &str,
        qualified_name: &str,
        bound_arguments: impl IntoIterator<Item = Value>,
    ) -> RegistryResult<BoundCallable> {
        self.resolve(
            CallableKind::Subscriber,
            &CallableRef::new(module_path, qualified_name).with_arguments(bound_arguments),
        )
    }

    pub fn task_function(
        &self,
        module_path: &str,
        qualified_name: &str,
        bound_arguments: impl IntoIterator<Item = Value>,
    ) -> RegistryResult<BoundCallable> {
        self.resolve(
            CallableKind::TaskFunction,
            &CallableRef::new(module_path, qualified_name).with_arguments(bound_arguments),
        )
    }

    fn canonical_key(&self, kind: CallableKind, key: &CallableKey) -> Option<CallableKey> {
        if self.entries.contains_key(&(kind, key.clone())) {
            return Some(key.clone());
        }
        self.aliases.get(&(kind, key.clone())).cloned()
    }
}

/// Serialize a live callable back into its storage triple.
pub fn serialize_callable(callable: &BoundCallable) -> CallableRef {
    callable.to_reference()
}
