use crate::executor::Executor;
use crate::LoaderKey;
use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A loader as stored by the executor, with its concrete type erased.
pub type SharedLoader = Rc<RefCell<dyn Loader>>;

/// Registration state the executor stamps onto every loader it creates.
///
/// Loaders embed one of these and hand it out through [`Loader::binding`]. Callers never
/// set it themselves; [`Executor::loader`] does so right after construction.
#[derive(Debug, Default)]
pub struct LoaderBinding {
    key: Option<LoaderKey>,
    executor: Weak<Executor>,
    handle: Option<Weak<RefCell<dyn Loader>>>,
}

impl LoaderBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key this loader was registered under, `None` if it was never registered.
    pub fn key(&self) -> Option<&LoaderKey> {
        self.key.as_ref()
    }

    /// The owning executor, if it is still alive.
    pub fn executor(&self) -> Option<Rc<Executor>> {
        self.executor.upgrade()
    }

    /// The registered loader itself, so it can still be resolved after it has left the
    /// queue. `None` for loaders that were never registered or have been dropped.
    pub fn handle(&self) -> Option<SharedLoader> {
        self.handle.as_ref()?.upgrade()
    }

    pub fn is_bound(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn bind(&mut self, key: LoaderKey, executor: &Rc<Executor>) {
        self.key = Some(key);
        self.executor = Rc::downgrade(executor);
    }

    pub(crate) fn attach(&mut self, handle: Weak<RefCell<dyn Loader>>) {
        self.handle = Some(handle);
    }

    pub(crate) fn weak_handle(&self) -> Option<Weak<RefCell<dyn Loader>>> {
        self.handle.clone()
    }
}

/// A unit of batchable work, registered once per key and resolved at most once.
///
/// `resolve` performs the batched fetch for everything queued against the loader. It may
/// re-enter the owning executor: registering new loaders (including under its own key)
/// or resolving other pending ones.
pub trait Loader: Any {
    fn binding(&self) -> &LoaderBinding;

    fn binding_mut(&mut self) -> &mut LoaderBinding;

    fn resolve(&mut self) -> anyhow::Result<()>;

    /// Label used in logs and errors for loaders that were never registered.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn loader_key(&self) -> Option<&LoaderKey> {
        self.binding().key()
    }
}

/// Registry slot holding one loader under both its erased and its `Any` view.
pub(crate) struct Entry {
    loader: SharedLoader,
    any: Rc<dyn Any>,
}

impl Entry {
    pub(crate) fn new<L: Loader>(loader: Rc<RefCell<L>>) -> Self {
        Self {
            any: loader.clone(),
            loader,
        }
    }

    pub(crate) fn loader(&self) -> &SharedLoader {
        &self.loader
    }

    pub(crate) fn into_loader(self) -> SharedLoader {
        self.loader
    }

    pub(crate) fn downcast<L: Loader>(&self) -> Option<Rc<RefCell<L>>> {
        Rc::clone(&self.any).downcast::<RefCell<L>>().ok()
    }
}
