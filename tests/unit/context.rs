use super::{register, setup};
use anyhow::{anyhow, Result};
use batchloader::context::{self, install, set_current};
use batchloader::{batch, batch_with, Executor, ExecutorConfig, ExecutorError};
use pretty_assertions::assert_eq;
use std::rc::Rc;

#[test]
fn test_current_is_last_write() -> Result<()> {
    let (first, _) = setup();
    let second = Executor::new();

    set_current(Some(first.clone()));
    set_current(Some(second.clone()));
    assert!(Rc::ptr_eq(&context::current().unwrap(), &second));

    set_current(None);
    assert!(context::current().is_none());
    Ok(())
}

#[test]
fn test_nested_code_finds_installed_executor() -> Result<()> {
    let (executor, log) = setup();
    let _guard = install(executor.clone());

    fn deep_call_site(log: &batchloader::test_util::ResolutionLog) -> Result<()> {
        let executor = Executor::current().ok_or_else(|| anyhow!("no executor installed"))?;
        register(&executor, "deep", log)
    }
    deep_call_site(&log)?;
    deep_call_site(&log)?;

    assert_eq!(executor.len(), 1);
    executor.wait_all()?;
    assert_eq!(*log.borrow(), vec!["deep"]);
    Ok(())
}

#[test]
fn test_batch_surfaces_resolution_errors() {
    let (_, log) = setup();
    let result = batch(|executor| {
        executor.loader(batchloader::LoaderKey::new("broken"), || {
            Ok(batchloader::test_util::RecordingLoader::new("broken", &log)
                .with_hook(|_| Err(anyhow!("lost connection"))))
        })?;
        Ok(())
    });

    let err = result.unwrap_err();
    let executor_err = err.downcast_ref::<ExecutorError>().unwrap();
    assert!(matches!(executor_err, ExecutorError::Resolution { .. }));
    assert!(context::current().is_none());
}

#[test]
fn test_batch_tick_limit_from_config() {
    let (_, log) = setup();
    let config = ExecutorConfig::from_json(r#"{"max_ticks": 1}"#).unwrap();
    let result = batch_with(config, |executor| {
        register(executor, "A", &log)?;
        register(executor, "B", &log)?;
        Ok(())
    });

    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ExecutorError>(),
        Some(ExecutorError::TickLimit { limit: 1 })
    ));
    assert_eq!(*log.borrow(), vec!["A"]);
}
