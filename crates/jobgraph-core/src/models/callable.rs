use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Job;
use crate::registry::{Callback, CallbackResult};

/// Stable registry key of a callable.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CallableKey {
    pub module_path: String,
    pub qualified_name: String,
}

impl CallableKey {
    pub fn new(module_path: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            qualified_name: qualified_name.into(),
        }
    }
}

impl Display for CallableKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.module_path, self.qualified_name)
    }
}

/// Durable, storage-shaped pointer to a registered callable.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CallableRef {
    pub module_path: String,
    pub qualified_name: String,
    #[serde(default)]
    pub bound_arguments: Vec<Value>,
}

impl CallableRef {
    pub fn new(module_path: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            qualified_name: qualified_name.into(),
            bound_arguments: Vec::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = Value>) -> Self {
        self.bound_arguments = arguments.into_iter().collect();
        self
    }

    pub fn key(&self) -> CallableKey {
        CallableKey::new(self.module_path.clone(), self.qualified_name.clone())
    }
}

impl Display for CallableRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.module_path, self.qualified_name)
    }
}

/// A [`CallableRef`] together with the live callback it resolved to.
///
/// `callback` is `None` for a placeholder: the stored reference could not be
/// resolved against the registry, so invoking it does nothing.
#[derive(Clone)]
pub struct BoundCallable {
    reference: CallableRef,
    callback: Option<Callback>,
}

impl BoundCallable {
    pub(crate) fn resolved(reference: CallableRef, callback: Callback) -> Self {
        Self {
            reference,
            callback: Some(callback),
        }
    }

    pub fn placeholder(reference: CallableRef) -> Self {
        Self {
            reference,
            callback: None,
        }
    }

    pub fn reference(&self) -> &CallableRef {
        &self.reference
    }

    pub fn to_reference(&self) -> CallableRef {
        self.reference.clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.callback.is_some()
    }

    pub fn callback(&self) -> Option<&Callback> {
        self.callback.as_ref()
    }

    pub fn invoke(&self, job: &Job) -> CallbackResult {
        match &self.callback {
            Some(callback) => callback(job, &self.reference.bound_arguments),
            None => Ok(()),
        }
    }
}

impl PartialEq for BoundCallable {
    fn eq(&self, other: &Self) -> bool {
        if self.reference != other.reference {
            return false;
        }
        match (&self.callback, &other.callback) {
            (Some(left), Some(right)) => Arc::ptr_eq(left, right),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Debug for BoundCallable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCallable")
            .field("reference", &self.reference)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
