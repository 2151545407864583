//! Per-thread slot holding the executor deeply nested code should use.
//!
//! The slot is a plain last-write-wins register: [`set_current`] overwrites it and
//! nothing is restored implicitly. [`install`] and [`batch`] layer scoped restoration on
//! top for callers that nest executors. Executors are `!Send`, so an executor installed
//! on one thread can never be observed from another.

use crate::config::ExecutorConfig;
use crate::executor::Executor;
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static CURRENT: RefCell<Option<Rc<Executor>>> = const { RefCell::new(None) };
}

pub fn current() -> Option<Rc<Executor>> {
    CURRENT.with(|slot| slot.borrow().clone())
}

pub fn set_current(executor: Option<Rc<Executor>>) {
    let previous = CURRENT.with(|slot| slot.replace(executor));
    // Dropped outside the borrow; an executor going away drops its pending loaders.
    drop(previous);
}

/// Puts the previously installed executor back when dropped.
#[must_use = "the previous executor is restored as soon as the guard is dropped"]
pub struct CurrentGuard {
    previous: Option<Rc<Executor>>,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        set_current(self.previous.take());
    }
}

/// Installs `executor` for this thread until the returned guard is dropped.
pub fn install(executor: Rc<Executor>) -> CurrentGuard {
    let previous = CURRENT.with(|slot| slot.replace(Some(executor)));
    CurrentGuard { previous }
}

/// Runs `f` inside a batch and drains every loader it registered.
///
/// Reuses the installed executor when called inside another batch; otherwise a fresh
/// executor is installed for the duration of the call. Either way the thread's slot is
/// back to its prior value when this returns, on success or failure.
pub fn batch<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Rc<Executor>) -> anyhow::Result<T>,
{
    batch_with(ExecutorConfig::default(), f)
}

/// [`batch`] with an explicit config for the executor it creates. The config is ignored
/// when an executor is already installed.
pub fn batch_with<T, F>(config: ExecutorConfig, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Rc<Executor>) -> anyhow::Result<T>,
{
    let (executor, _guard) = match current() {
        Some(executor) => (executor, None),
        None => {
            let executor = Executor::with_config(config);
            let guard = install(executor.clone());
            tracing::debug!(executor = %executor.id(), "started batch");
            (executor, Some(guard))
        }
    };

    let value = f(&executor)?;
    executor.wait_all()?;
    Ok(value)
}
