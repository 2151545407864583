use batchloader::test_util::{init_tracing, resolution_log, RecordingLoader, ResolutionLog};
use batchloader::{Executor, LoaderKey};
use std::rc::Rc;

mod context;
mod queue;

/// Registers a [`RecordingLoader`] labelled after its key.
pub fn register(executor: &Rc<Executor>, name: &'static str, log: &ResolutionLog) -> anyhow::Result<()> {
    executor.loader(LoaderKey::new(name), || Ok(RecordingLoader::new(name, log)))?;
    Ok(())
}

pub fn setup() -> (Rc<Executor>, ResolutionLog) {
    init_tracing();
    (Executor::new(), resolution_log())
}
