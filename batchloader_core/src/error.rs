use crate::key::LoaderKey;
use thiserror::Error;

/// Failure to build a [`LoaderKey`]
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Failed to encode loader arguments: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    /// `tick` was called with nothing pending.
    #[error("No pending loaders to resolve")]
    EmptyQueue,

    #[error("Failed to construct loader {key}: {source}")]
    Construction {
        key: LoaderKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("Loader {key} failed to resolve: {source}")]
    Resolution {
        key: LoaderKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("Loader {key} is registered as a different type than {expected}")]
    TypeMismatch {
        key: LoaderKey,
        expected: &'static str,
    },

    /// The loader's own resolve body is still on the stack.
    #[error("Loader {loader} is already resolving")]
    AlreadyResolving { loader: String },

    #[error("Exceeded the limit of {limit} ticks while draining loaders")]
    TickLimit { limit: usize },

    #[error("No value was fulfilled for {key}")]
    Unfulfilled { key: String },

    #[error("Batch for {key} failed: {message}")]
    BatchFailed { key: String, message: String },
}

impl ExecutorError {
    /// Key of the loader the error is about, when there is one.
    pub fn loader_key(&self) -> Option<&LoaderKey> {
        match self {
            Self::Construction { key, .. }
            | Self::Resolution { key, .. }
            | Self::TypeMismatch { key, .. } => Some(key),
            _ => None,
        }
    }
}
