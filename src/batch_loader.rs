use crate::executor::Executor;
use crate::loader::{Loader, LoaderBinding};
use crate::ExecutorError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::{Rc, Weak};

pub type FetchFn<K, V> = Box<dyn FnMut(&[K]) -> anyhow::Result<HashMap<K, V>>>;

/// Where a [`Deferred`] value stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DeferredState {
    Pending,
    Ready,
    Unfulfilled,
    Failed,
}

enum Slot<V> {
    Pending,
    Ready(V),
    Unfulfilled,
    Failed(Rc<str>),
}

impl<V> Slot<V> {
    fn state(&self) -> DeferredState {
        match self {
            Slot::Pending => DeferredState::Pending,
            Slot::Ready(_) => DeferredState::Ready,
            Slot::Unfulfilled => DeferredState::Unfulfilled,
            Slot::Failed(_) => DeferredState::Failed,
        }
    }
}

/// Loader that collects keys and fetches them in one call.
///
/// Each distinct key is fetched once per loader: loading a key twice hands back two
/// views of the same value. The fetch function receives keys in the order they were
/// first requested.
pub struct BatchLoader<K, V> {
    binding: LoaderBinding,
    fetch: FetchFn<K, V>,
    queue: Vec<K>,
    slots: HashMap<K, Rc<RefCell<Slot<V>>>>,
}

impl<K, V> BatchLoader<K, V>
where
    K: Eq + Hash + Clone + Debug + 'static,
    V: Clone + 'static,
{
    pub fn new<F>(fetch: F) -> Self
    where
        F: FnMut(&[K]) -> anyhow::Result<HashMap<K, V>> + 'static,
    {
        Self {
            binding: LoaderBinding::new(),
            fetch: Box::new(fetch),
            queue: Vec::new(),
            slots: HashMap::new(),
        }
    }

    pub fn load(&mut self, key: K) -> Deferred<K, V> {
        let slot = match self.slots.get(&key) {
            Some(slot) => slot.clone(),
            None => {
                let slot = Rc::new(RefCell::new(Slot::Pending));
                self.queue.push(key.clone());
                self.slots.insert(key.clone(), slot.clone());
                slot
            }
        };
        Deferred {
            key,
            slot,
            loader: self.binding.weak_handle(),
        }
    }

    pub fn load_many(&mut self, keys: impl IntoIterator<Item = K>) -> Vec<Deferred<K, V>> {
        keys.into_iter().map(|key| self.load(key)).collect()
    }

    /// Seeds a value for `key` so it is never fetched. Keys that were already loaded
    /// keep their current slot.
    pub fn prime(&mut self, key: K, value: V) {
        self.slots
            .entry(key)
            .or_insert_with(|| Rc::new(RefCell::new(Slot::Ready(value))));
    }

    /// Keys queued for the next fetch.
    pub fn queued(&self) -> &[K] {
        &self.queue
    }

    fn settle(&self, key: &K, outcome: Slot<V>) {
        if let Some(slot) = self.slots.get(key) {
            *slot.borrow_mut() = outcome;
        }
    }
}

impl<K, V> Loader for BatchLoader<K, V>
where
    K: Eq + Hash + Clone + Debug + 'static,
    V: Clone + 'static,
{
    fn binding(&self) -> &LoaderBinding {
        &self.binding
    }

    fn binding_mut(&mut self) -> &mut LoaderBinding {
        &mut self.binding
    }

    /// Fetch failures settle every queued key as failed rather than propagating, so the
    /// rest of the queue keeps draining.
    fn resolve(&mut self) -> anyhow::Result<()> {
        let keys = std::mem::take(&mut self.queue);
        if keys.is_empty() {
            return Ok(());
        }

        match (self.fetch)(&keys) {
            Ok(mut values) => {
                for key in &keys {
                    let outcome = values.remove(key).map_or(Slot::Unfulfilled, Slot::Ready);
                    self.settle(key, outcome);
                }
            }
            Err(err) => {
                let message: Rc<str> = format!("{err:#}").into();
                tracing::warn!(
                    loader = ?self.binding.key(),
                    keys = keys.len(),
                    error = %message,
                    "batch fetch failed"
                );
                for key in &keys {
                    self.settle(key, Slot::Failed(message.clone()));
                }
            }
        }
        Ok(())
    }
}

/// Handle to a value a [`BatchLoader`] will produce.
pub struct Deferred<K, V> {
    key: K,
    slot: Rc<RefCell<Slot<V>>>,
    loader: Option<Weak<RefCell<dyn Loader>>>,
}

impl<K: Clone, V> Clone for Deferred<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            slot: self.slot.clone(),
            loader: self.loader.clone(),
        }
    }
}

impl<K: Debug, V: Clone> Deferred<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn state(&self) -> DeferredState {
        self.slot.borrow().state()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == DeferredState::Pending
    }

    /// The settled outcome, or `None` while the batch has not run.
    pub fn peek(&self) -> Option<Result<V, ExecutorError>> {
        match &*self.slot.borrow() {
            Slot::Pending => None,
            Slot::Ready(value) => Some(Ok(value.clone())),
            Slot::Unfulfilled => Some(Err(ExecutorError::Unfulfilled {
                key: format!("{:?}", self.key),
            })),
            Slot::Failed(message) => Some(Err(ExecutorError::BatchFailed {
                key: format!("{:?}", self.key),
                message: message.to_string(),
            })),
        }
    }

    /// Ticks `executor` until this value settles.
    ///
    /// A key loaded after its loader already left the queue is fetched by resolving that
    /// loader directly once the queue is drained. Only values whose loader was never
    /// registered, or has been dropped, are reported as unfulfilled.
    pub fn wait(&self, executor: &Executor) -> Result<V, ExecutorError> {
        while self.is_pending() && !executor.is_empty() {
            executor.tick()?;
        }
        if self.is_pending() {
            if let Some(loader) = self.loader.as_ref().and_then(Weak::upgrade) {
                executor.resolve(&loader)?;
            }
        }
        self.peek().unwrap_or_else(|| {
            Err(ExecutorError::Unfulfilled {
                key: format!("{:?}", self.key),
            })
        })
    }
}

impl<K: Debug, V> Debug for Deferred<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("key", &self.key)
            .field("state", &self.slot.borrow().state())
            .finish()
    }
}
