use crate::error::Result;
use crate::store::{ActionApi, MutationApi};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) type MutationFn<S> =
    Arc<dyn Fn(&MutationApi<'_, S>, Option<S>) -> Result<S> + Send + Sync>;
pub(crate) type ActionFn<S> = Arc<dyn Fn(ActionApi<S>, Option<S>) -> Result<()> + Send + Sync>;

/// A named unit of state together with the mutations and actions that drive it.
///
/// Modules are plain values until handed to [`Store::register`](crate::Store::register),
/// which takes ownership of the initial state.
///
/// # Examples
///
/// ```
/// use statehub::{Module, Store};
///
/// let counter = Module::new(0i64)
///     .mutation("increment", |api, _| Ok(api.state() + 1))
///     .mutation("add", |api, data| Ok(api.state() + data.unwrap_or(0)));
///
/// let store = Store::new();
/// store.register("counter", counter).unwrap();
/// store.mutate("counter", "add", Some(5)).unwrap();
/// assert_eq!(*store.state("counter").unwrap(), 5);
/// ```
pub struct Module<S> {
    pub(crate) state: S,
    pub(crate) mutations: HashMap<String, MutationFn<S>>,
    pub(crate) actions: HashMap<String, ActionFn<S>>,
}

impl<S: Clone + Send + Sync + 'static> Module<S> {
    /// Create a module with the given initial state and no handlers.
    pub fn new(state: S) -> Self {
        Self {
            state,
            mutations: HashMap::new(),
            actions: HashMap::new(),
        }
    }

    /// Add a synchronous mutation.
    ///
    /// The returned value replaces the module state wholesale. Registering
    /// the same name twice keeps the last function.
    pub fn mutation<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&MutationApi<'_, S>, Option<S>) -> Result<S> + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Arc::new(f));
        self
    }

    /// Add an action.
    ///
    /// Actions receive an owned [`ActionApi`] which may be moved into a
    /// spawned task to finish work asynchronously.
    pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ActionApi<S>, Option<S>) -> Result<()> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(f));
        self
    }

    /// The initial state this module will be registered with.
    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn has_mutation(&self, name: &str) -> bool {
        self.mutations.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
}

impl<S: fmt::Debug> fmt::Debug for Module<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut mutations: Vec<_> = self.mutations.keys().collect();
        mutations.sort();
        let mut actions: Vec<_> = self.actions.keys().collect();
        actions.sort();
        f.debug_struct("Module")
            .field("state", &self.state)
            .field("mutations", &mutations)
            .field("actions", &actions)
            .finish()
    }
}
