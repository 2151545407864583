use crate::executor::Executor;
use crate::loader::{Loader, LoaderBinding};
use anyhow::anyhow;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared record of which loaders resolved, in order.
pub type ResolutionLog = Rc<RefCell<Vec<String>>>;

type Hook = Box<dyn FnMut(&Rc<Executor>) -> anyhow::Result<()>>;

pub fn resolution_log() -> ResolutionLog {
    Rc::default()
}

/// Loader that appends its label to a [`ResolutionLog`] when resolved, then runs an
/// optional hook against its owning executor from inside the resolve body.
pub struct RecordingLoader {
    binding: LoaderBinding,
    label: String,
    log: ResolutionLog,
    hook: Option<Hook>,
    resolutions: usize,
}

impl RecordingLoader {
    pub fn new(label: impl Into<String>, log: &ResolutionLog) -> Self {
        Self {
            binding: LoaderBinding::new(),
            label: label.into(),
            log: log.clone(),
            hook: None,
            resolutions: 0,
        }
    }

    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&Rc<Executor>) -> anyhow::Result<()> + 'static,
    {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// How many times this instance's resolve body ran.
    pub fn resolutions(&self) -> usize {
        self.resolutions
    }
}

impl Loader for RecordingLoader {
    fn binding(&self) -> &LoaderBinding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut LoaderBinding {
        &mut self.binding
    }

    fn resolve(&mut self) -> anyhow::Result<()> {
        self.resolutions += 1;
        self.log.borrow_mut().push(self.label.clone());
        if let Some(hook) = self.hook.as_mut() {
            let executor = self
                .binding
                .executor()
                .ok_or_else(|| anyhow!("loader {} has no live executor", self.label))?;
            hook(&executor)?;
        }
        Ok(())
    }
}

/// Installs a fmt subscriber filtered by `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
