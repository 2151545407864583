use crate::error::KeyError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Identity a loader is registered under.
///
/// Two requests with equal keys on the same executor share one loader. The name is
/// usually the loader's type; `args` carries whatever construction arguments make two
/// loaders of the same type distinct (a table name, a column, a scope).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoaderKey {
    name: Cow<'static, str>,
    args: Option<String>,
}

impl LoaderKey {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            args: None,
        }
    }

    /// Key named after a Rust type, for loaders that take no arguments.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(std::any::type_name::<T>())
    }

    /// Attaches construction arguments to the key.
    ///
    /// Arguments are encoded through `serde_json::Value`, whose objects keep their keys
    /// sorted, so structurally equal arguments always produce equal keys.
    pub fn with_args<A: Serialize + ?Sized>(mut self, args: &A) -> Result<Self, KeyError> {
        let value = serde_json::to_value(args)?;
        self.args = Some(value.to_string());
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> Option<&str> {
        self.args.as_deref()
    }
}

impl fmt::Display for LoaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.args {
            Some(args) => write!(f, "{}({})", self.name, args),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&'static str> for LoaderKey {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl From<String> for LoaderKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}
