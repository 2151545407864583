//! batchloader - coalesces keyed data loads into batched fetches
//!
//! Independent call sites register the loader they need on the current
//! [`Executor`]; the surrounding engine later drains the executor, running each
//! loader's batched fetch once, in first-registration order. Loaders may register
//! further loaders while resolving, which simply join the back of the queue.
//!
//! ```
//! use batchloader::{batch, BatchLoader, LoaderKey};
//!
//! let names = batch(|executor| {
//!     let users = executor.loader(LoaderKey::new("users"), || {
//!         Ok(BatchLoader::new(|ids: &[u32]| {
//!             Ok(ids.iter().map(|id| (*id, format!("user-{id}"))).collect())
//!         }))
//!     })?;
//!     let mut users = users.borrow_mut();
//!     Ok(vec![users.load(1), users.load(2)])
//! })?;
//!
//! assert_eq!(names[1].peek().unwrap()?, "user-2");
//! # Ok::<(), anyhow::Error>(())
//! ```

mod batch_loader;
pub mod config;
pub mod context;
mod executor;
pub mod loader;
pub mod metrics;
#[cfg(any(test, feature = "tests-cfg"))]
pub mod test_util;

pub use batch_loader::{BatchLoader, Deferred, DeferredState, FetchFn};
pub use batchloader_core::{ExecutorError, KeyError, LoaderKey};
pub use config::ExecutorConfig;
pub use context::{batch, batch_with, CurrentGuard};
pub use executor::Executor;
pub use loader::{Loader, LoaderBinding, SharedLoader};
pub use metrics::{ExecutorMetrics, MetricsSnapshot};
