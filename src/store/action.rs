use super::Store;
use crate::error::Result;
use crate::module::Module;
use std::sync::Arc;

/// Capabilities handed to an action.
///
/// The bundle owns a handle to its store, so it can be cloned and moved
/// into a spawned task; every call re-enters the store through its public
/// operations with their usual validation and notifications.
///
/// # Examples
///
/// ```
/// use statehub::{Module, Store};
///
/// let store = Store::new();
/// store
///     .register(
///         "clock",
///         Module::new(0u64)
///             .mutation("set", |api, data| Ok(data.unwrap_or(*api.state())))
///             .action("tick", |api, _| {
///                 let now = *api.state()? + 1;
///                 api.mutate(api.hash(), "set", Some(now))
///             }),
///     )
///     .unwrap();
///
/// store.dispatch("clock", "tick", None).unwrap();
/// assert_eq!(*store.state("clock").unwrap(), 1);
/// ```
pub struct ActionApi<S> {
    store: Store<S>,
    hash: String,
}

impl<S> Clone for ActionApi<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            hash: self.hash.clone(),
        }
    }
}

impl<S: Clone + Send + Sync + 'static> ActionApi<S> {
    pub(crate) fn new(store: Store<S>, hash: &str) -> Self {
        Self {
            store,
            hash: hash.to_string(),
        }
    }

    /// Hash of the module whose action is running.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Current state of this action's module.
    ///
    /// Fails if the module has been unregistered since the action started.
    pub fn state(&self) -> Result<Arc<S>> {
        self.store.state(&self.hash)
    }

    /// Run a mutation; see [`Store::mutate`].
    pub fn mutate(&self, hash: &str, name: &str, data: Option<S>) -> Result<()> {
        self.store.mutate(hash, name, data)
    }

    /// Run another action; see [`Store::dispatch`].
    pub fn dispatch(&self, hash: &str, name: &str, data: Option<S>) -> Result<()> {
        self.store.dispatch(hash, name, data)
    }

    /// Register a module; see [`Store::register`].
    pub fn register(&self, hash: impl Into<String>, module: Module<S>) -> Result<String> {
        self.store.register(hash, module)
    }

    /// Remove a module; see [`Store::unregister`].
    pub fn unregister(&self, hash: &str) -> Result<()> {
        self.store.unregister(hash)
    }

    /// Create a combiner; see [`Store::combine`].
    pub fn combine<I, H, F>(&self, hash: impl Into<String>, modules: I, reducer: F) -> Result<String>
    where
        I: IntoIterator<Item = H>,
        H: Into<String>,
        F: Fn(&[&S]) -> S + Send + Sync + 'static,
    {
        self.store.combine(hash, modules, reducer)
    }

    /// Remove a combiner; see [`Store::uncombine`].
    pub fn uncombine(&self, hash: &str) -> Result<()> {
        self.store.uncombine(hash)
    }
}
