use super::{register, setup};
use anyhow::{anyhow, Result};
use batchloader::test_util::RecordingLoader;
use batchloader::{ExecutorError, Loader, LoaderKey};
use pretty_assertions::assert_eq;
use std::rc::Rc;

#[test]
fn test_independent_loaders_resolve_in_order() -> Result<()> {
    let (executor, log) = setup();
    register(&executor, "A", &log)?;
    register(&executor, "B", &log)?;
    register(&executor, "C", &log)?;

    executor.wait_all()?;

    assert_eq!(*log.borrow(), vec!["A", "B", "C"]);
    assert!(executor.is_empty());
    Ok(())
}

#[test]
fn test_repeated_registration_returns_same_instance() -> Result<()> {
    let (executor, log) = setup();
    let mut builds = 0;
    let handles = (0..5)
        .map(|_| {
            executor.loader(LoaderKey::new("users"), || {
                builds += 1;
                Ok(RecordingLoader::new("users", &log))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    assert_eq!(builds, 1);
    assert!(handles.windows(2).all(|pair| Rc::ptr_eq(&pair[0], &pair[1])));

    executor.wait_all()?;
    assert_eq!(*log.borrow(), vec!["users"]);
    Ok(())
}

#[test]
fn test_resolving_key_reregisters_itself() -> Result<()> {
    let (executor, log) = setup();
    let inner_log = log.clone();
    let original = executor.loader(LoaderKey::new("A"), || {
        Ok(RecordingLoader::new("A-original", &log).with_hook(move |executor| {
            let fresh = executor.loader(LoaderKey::new("A"), || {
                Ok(RecordingLoader::new("A-follow-up", &inner_log))
            })?;
            assert_eq!(fresh.borrow().loader_key(), Some(&LoaderKey::new("A")));
            Ok(())
        }))
    })?;
    register(&executor, "B", &log)?;

    executor.wait_all()?;

    assert_eq!(*log.borrow(), vec!["A-original", "B", "A-follow-up"]);
    assert_eq!(original.borrow().resolutions(), 1);
    Ok(())
}

#[test]
fn test_recursive_batches_drain() -> Result<()> {
    let (executor, log) = setup();

    // Each level registers the next until depth 4.
    fn level(depth: u32, log: &batchloader::test_util::ResolutionLog) -> RecordingLoader {
        let next = log.clone();
        RecordingLoader::new(format!("level-{depth}"), log).with_hook(move |executor| {
            if depth < 4 {
                let key = LoaderKey::new("level").with_args(&(depth + 1))?;
                executor.loader(key, || Ok(level(depth + 1, &next)))?;
            }
            Ok(())
        })
    }
    executor.loader(LoaderKey::new("level").with_args(&0)?, || Ok(level(0, &log)))?;

    executor.wait_all()?;

    assert_eq!(
        *log.borrow(),
        vec!["level-0", "level-1", "level-2", "level-3", "level-4"]
    );
    assert_eq!(executor.metrics().ticks, 5);
    Ok(())
}

#[test]
fn test_failed_resolution_is_not_retried() -> Result<()> {
    let (executor, log) = setup();
    executor.loader(LoaderKey::new("broken"), || {
        Ok(RecordingLoader::new("broken", &log).with_hook(|_| Err(anyhow!("deadlock detected"))))
    })?;
    register(&executor, "after", &log)?;

    let err = executor.wait_all().unwrap_err();
    assert_eq!(err.loader_key(), Some(&LoaderKey::new("broken")));
    assert!(err.to_string().contains("deadlock detected"));
    assert_eq!(executor.pending_keys(), vec![LoaderKey::new("after")]);

    executor.wait_all()?;
    assert_eq!(*log.borrow(), vec!["broken", "after"]);
    Ok(())
}

#[test]
fn test_clear_then_wait_all_is_noop() -> Result<()> {
    let (executor, log) = setup();
    register(&executor, "A", &log)?;
    register(&executor, "B", &log)?;

    executor.clear();
    assert!(executor.is_empty());
    executor.wait_all()?;

    assert!(log.borrow().is_empty());
    assert!(matches!(executor.tick(), Err(ExecutorError::EmptyQueue)));
    Ok(())
}

#[test]
fn test_resolve_sibling_from_inside_resolve() -> Result<()> {
    let (executor, log) = setup();
    executor.loader(LoaderKey::new("A"), || {
        Ok(RecordingLoader::new("A", &log).with_hook(|executor| {
            // Drains B from inside A's body.
            executor.tick()?;
            Ok(())
        }))
    })?;
    register(&executor, "B", &log)?;
    register(&executor, "C", &log)?;

    executor.wait_all()?;

    assert_eq!(*log.borrow(), vec!["A", "B", "C"]);
    Ok(())
}
