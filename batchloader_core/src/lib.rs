//! Core types shared by the batchloader executor: the key loaders are registered
//! under and the error taxonomy every executor operation reports through.

pub mod error;
pub mod key;

pub use error::{ExecutorError, KeyError};
pub use key::LoaderKey;
