use crate::config::ExecutorConfig;
use crate::context;
use crate::loader::{Entry, Loader, SharedLoader};
use crate::metrics::{ExecutorMetrics, MetricsSnapshot};
use crate::{ExecutorError, LoaderKey};
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

/// Coalesces loader registrations and resolves them in first-registration order.
///
/// One executor serves one top-level operation. Call sites ask it for the loader behind
/// a key with [`loader`](Self::loader), queue demand on that loader, and the surrounding
/// engine eventually calls [`wait_all`](Self::wait_all) to run every pending batch.
///
/// Executors are single-threaded and live behind an `Rc` so loaders can hold a weak
/// back-reference to them. All operations take `&self` and may be re-entered from inside
/// a loader's resolve body.
pub struct Executor {
    id: Uuid,
    config: ExecutorConfig,
    loaders: RefCell<IndexMap<LoaderKey, Entry>>,
    loading: Cell<bool>,
    metrics: ExecutorMetrics,
}

impl Executor {
    pub fn new() -> Rc<Self> {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Rc<Self> {
        Rc::new(Self {
            id: Uuid::new_v4(),
            config,
            loaders: RefCell::new(IndexMap::new()),
            loading: Cell::new(false),
            metrics: ExecutorMetrics::new(),
        })
    }

    /// The executor installed for the current thread, if any.
    pub fn current() -> Option<Rc<Self>> {
        context::current()
    }

    /// Replaces the current thread's executor. The previous value is not restored
    /// automatically; use [`context::install`] for that.
    pub fn set_current(executor: Option<Rc<Self>>) {
        context::set_current(executor)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// True while a loader's resolve body (or anything it calls synchronously) runs,
    /// except inside [`defer`](Self::defer).
    ///
    /// Instrumentation reads this to tell batched data access from ad hoc access.
    pub fn loading(&self) -> bool {
        self.loading.get()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.borrow().is_empty()
    }

    /// Number of loaders registered and not yet resolving.
    pub fn len(&self) -> usize {
        self.loaders.borrow().len()
    }

    pub fn contains(&self, key: &LoaderKey) -> bool {
        self.loaders.borrow().contains_key(key)
    }

    /// Keys of pending loaders, in the order they will resolve.
    pub fn pending_keys(&self) -> Vec<LoaderKey> {
        self.loaders.borrow().keys().cloned().collect()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Returns the pending loader registered under `key`, building it with `build` if
    /// there is none.
    ///
    /// `build` only runs on a miss. The new loader is stamped with `key` and a weak
    /// reference to this executor, then appended to the queue. A failing `build` leaves
    /// the registry untouched.
    pub fn loader<L, F>(
        self: &Rc<Self>,
        key: LoaderKey,
        build: F,
    ) -> Result<Rc<RefCell<L>>, ExecutorError>
    where
        L: Loader,
        F: FnOnce() -> anyhow::Result<L>,
    {
        let existing = self.loaders.borrow().get(&key).map(Entry::downcast::<L>);
        match existing {
            Some(Some(loader)) => return Ok(loader),
            Some(None) => {
                return Err(ExecutorError::TypeMismatch {
                    key,
                    expected: std::any::type_name::<L>(),
                })
            }
            None => {}
        }

        // The registry is not borrowed here: `build` may register other loaders.
        let mut loader = build().map_err(|source| ExecutorError::Construction {
            key: key.clone(),
            source,
        })?;
        loader.binding_mut().bind(key.clone(), self);
        let loader = Rc::new(RefCell::new(loader));
        let erased: SharedLoader = loader.clone();
        loader.borrow_mut().binding_mut().attach(Rc::downgrade(&erased));

        tracing::debug!(executor = %self.id, key = %key, "registered loader");
        self.loaders
            .borrow_mut()
            .insert(key, Entry::new(loader.clone()));
        self.metrics.record_registration();
        Ok(loader)
    }

    /// Resolves `loader` now, whether or not it is at the head of the queue.
    ///
    /// The registry entry under the loader's key is detached before the resolve body
    /// runs, so a `loader(key, ..)` call from inside that body builds a fresh loader
    /// instead of handing back the one in flight.
    pub fn resolve<L>(&self, loader: &Rc<RefCell<L>>) -> Result<(), ExecutorError>
    where
        L: Loader + ?Sized,
    {
        self.resolve_with(&**loader, || std::any::type_name::<L>().to_string())
    }

    /// Pops the oldest pending loader and resolves it.
    ///
    /// Fails with [`ExecutorError::EmptyQueue`] when nothing is pending.
    pub fn tick(&self) -> Result<(), ExecutorError> {
        let (key, entry) = self
            .loaders
            .borrow_mut()
            .shift_remove_index(0)
            .ok_or(ExecutorError::EmptyQueue)?;
        self.metrics.record_tick();
        let loader: &RefCell<dyn Loader> = entry.loader();
        self.resolve_with(loader, || key.to_string())
    }

    /// Ticks until no loader is pending, including loaders registered along the way.
    pub fn wait_all(&self) -> Result<(), ExecutorError> {
        let mut ticks = 0usize;
        while !self.is_empty() {
            if let Some(limit) = self.config.max_ticks {
                if ticks >= limit {
                    tracing::warn!(
                        executor = %self.id,
                        label = ?self.config.label,
                        pending = self.len(),
                        "tick limit reached while draining loaders"
                    );
                    return Err(ExecutorError::TickLimit { limit });
                }
            }
            self.tick()?;
            ticks += 1;
        }
        Ok(())
    }

    /// Drops every pending loader without resolving it.
    pub fn clear(&self) {
        let discarded = std::mem::take(&mut *self.loaders.borrow_mut());
        if !discarded.is_empty() {
            tracing::debug!(executor = %self.id, count = discarded.len(), "discarded pending loaders");
        }
        self.metrics.record_discarded(discarded.len());
    }

    /// Runs `callback` with [`loading`](Self::loading) forced off.
    ///
    /// For continuations a loader hands back synchronously: whatever data access they do
    /// is the caller's, not the batch's.
    pub fn defer<R>(&self, callback: impl FnOnce() -> R) -> R {
        self.with_loading(false, callback)
    }

    /// Removes the oldest pending loader and returns it unresolved.
    #[deprecated(note = "use `tick`, which resolves the loader it removes")]
    pub fn shift(&self) -> Option<SharedLoader> {
        tracing::warn!("Executor::shift is deprecated");
        self.loaders
            .borrow_mut()
            .shift_remove_index(0)
            .map(|(_, entry)| entry.into_loader())
    }

    /// Snapshot of the registry in queue order.
    #[deprecated(note = "use `pending_keys`, `contains` or `loader` instead")]
    pub fn loaders(&self) -> IndexMap<LoaderKey, SharedLoader> {
        tracing::warn!("Executor::loaders is deprecated");
        self.loaders
            .borrow()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.loader().clone()))
            .collect()
    }

    fn resolve_with<L: Loader + ?Sized>(
        &self,
        loader: &RefCell<L>,
        describe: impl FnOnce() -> String,
    ) -> Result<(), ExecutorError> {
        let mut loader = loader
            .try_borrow_mut()
            .map_err(|_| ExecutorError::AlreadyResolving { loader: describe() })?;

        let key = match loader.loader_key() {
            Some(key) => {
                let key = key.clone();
                self.remove_loader(&key);
                key
            }
            None => LoaderKey::new(loader.name()),
        };

        let _span = tracing::debug_span!("resolve", executor = %self.id, key = %key).entered();
        let result = self.with_loading(true, || loader.resolve());
        self.metrics.record_resolution(result.is_ok());

        result.map_err(|source| {
            tracing::warn!(executor = %self.id, key = %key, error = %source, "loader failed to resolve");
            ExecutorError::Resolution { key, source }
        })
    }

    fn remove_loader(&self, key: &LoaderKey) {
        let removed = self.loaders.borrow_mut().shift_remove(key);
        drop(removed);
    }

    fn with_loading<R>(&self, loading: bool, f: impl FnOnce() -> R) -> R {
        let _guard = LoadingGuard::enter(&self.loading, loading);
        f()
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id)
            .field("label", &self.config.label)
            .field("pending", &self.pending_keys())
            .field("loading", &self.loading.get())
            .finish()
    }
}

/// Restores the previous loading flag when dropped, including during unwinding.
struct LoadingGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> LoadingGuard<'a> {
    fn enter(flag: &'a Cell<bool>, loading: bool) -> Self {
        let previous = flag.replace(loading);
        Self { flag, previous }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}
