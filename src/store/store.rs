use super::action::ActionApi;
use super::config::StoreConfig;
use super::mutation::{Cascade, InFlightGuard, MutationApi};
use super::registry::Registry;
use super::subscription::{Handler, StateChange, SubscriptionId};
use crate::error::{Result, StoreError};
use crate::module::Module;
use parking_lot::{Mutex, ReentrantMutex};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// A global state container made of independently registered modules.
///
/// `Store` is a handle: clones share one registry, while every
/// [`Store::new`] starts an isolated one. The registry lock is never held
/// while user code (mutations, actions, reducers, handlers, middlewares)
/// runs, so all of them may call back into the store.
///
/// Top-level mutations, together with their notifications, are serialized
/// across threads: a mutation always reads the state the previous one wrote.
///
/// # Examples
///
/// ```
/// use statehub::{Module, Store};
/// use std::sync::{Arc, Mutex};
///
/// let store = Store::new();
/// store
///     .register("count", Module::new(0).mutation("increment", |api, _| Ok(api.state() + 1)))
///     .unwrap();
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// store
///     .subscribe("count", move |value| sink.lock().unwrap().push(*value))
///     .unwrap();
///
/// store.mutate("count", "increment", None).unwrap();
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
/// ```
pub struct Store<S> {
    inner: Arc<Mutex<Registry<S>>>,
    // Held for a whole `mutate` (and a subscription's first delivery).
    // Reentrant so handlers on the same thread can mutate again.
    gate: Arc<ReentrantMutex<()>>,
    config: Arc<StoreConfig>,
}

impl<S: Clone + Send + Sync + 'static> Store<S> {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry::new())),
            gate: Arc::new(ReentrantMutex::new(())),
            config: Arc::new(config),
        }
    }

    /// The configuration this store was created with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn label(&self) -> &str {
        &self.config.label
    }

    // Shared by all clones, distinct between stores.
    fn id(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    /// Register a module under `hash`, together with its default combiner.
    pub fn register(&self, hash: impl Into<String>, module: Module<S>) -> Result<String> {
        let hash = hash.into();
        self.inner.lock().register(hash.clone(), module)?;
        debug!(store = self.label(), hash = %hash, "registered module");
        Ok(hash)
    }

    /// Remove a module and its default combiner.
    ///
    /// Subscriptions on the default combiner are dropped silently. Fails
    /// while any other combiner still reads from the module.
    pub fn unregister(&self, hash: &str) -> Result<()> {
        let dropped = self.inner.lock().unregister(hash)?;
        debug!(
            store = self.label(),
            hash,
            dropped_subscriptions = dropped,
            "unregistered module"
        );
        Ok(())
    }

    /// Create a combiner projecting `modules` through `reducer`.
    ///
    /// The reducer receives module states in the order given here.
    pub fn combine<I, H, F>(&self, hash: impl Into<String>, modules: I, reducer: F) -> Result<String>
    where
        I: IntoIterator<Item = H>,
        H: Into<String>,
        F: Fn(&[&S]) -> S + Send + Sync + 'static,
    {
        let hash = hash.into();
        let modules: Vec<String> = modules.into_iter().map(Into::into).collect();
        let count = modules.len();
        self.inner
            .lock()
            .combine(hash.clone(), modules, Arc::new(reducer))?;
        debug!(store = self.label(), hash = %hash, modules = count, "combined modules");
        Ok(hash)
    }

    /// Remove a user-defined combiner that has no subscriptions left.
    pub fn uncombine(&self, hash: &str) -> Result<()> {
        self.inner.lock().uncombine(hash)?;
        debug!(store = self.label(), hash, "uncombined");
        Ok(())
    }

    /// Subscribe to a combiner.
    ///
    /// `handler` is called once right away with the current value, then
    /// after every mutation of a module the combiner reads from.
    pub fn subscribe<F>(&self, hash: &str, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(&S) + Send + Sync + 'static,
    {
        let handler: Handler<S> = Arc::new(handler);
        let _gate = self.gate.lock();
        let (id, snapshot) = self.inner.lock().subscribe(hash, Arc::clone(&handler))?;
        trace!(store = self.label(), hash, subscription = %id, "subscribed");

        handler(&*snapshot.resolve());
        Ok(id)
    }

    /// Remove one subscription from a combiner.
    pub fn unsubscribe(&self, hash: &str, id: SubscriptionId) -> Result<()> {
        self.inner.lock().unsubscribe(hash, id)?;
        trace!(store = self.label(), hash, subscription = %id, "unsubscribed");
        Ok(())
    }

    /// Install a middleware. Middlewares see every module change, in
    /// installation order, after the combiner subscribers were notified.
    /// There is no way to remove one.
    pub fn use_middleware<F>(&self, middleware: F)
    where
        F: Fn(&StateChange<'_, S>) + Send + Sync + 'static,
    {
        self.inner.lock().add_middleware(Arc::new(middleware));
        debug!(store = self.label(), "installed middleware");
    }

    /// Run the mutation `name` of module `hash`.
    ///
    /// Nested mutations triggered through [`MutationApi::mutate`] belong to
    /// this call. Once it returns, each changed module is notified exactly
    /// once, in the order the modules first finished mutating. Modules that
    /// finished before a failure keep their new state and are still notified.
    pub fn mutate(&self, hash: &str, name: &str, data: Option<S>) -> Result<()> {
        let _gate = self.gate.lock();
        let cascade = Cascade::default();
        let outcome = self.apply_mutation(&cascade, hash, name, data);

        for changed in cascade.into_completed() {
            self.notify(&changed);
        }
        outcome
    }

    pub(crate) fn apply_mutation(
        &self,
        cascade: &Cascade,
        hash: &str,
        name: &str,
        data: Option<S>,
    ) -> Result<()> {
        let (mutation, state) = {
            let registry = self.inner.lock();
            let module = registry.module(hash)?;
            let mutation = module.mutations.get(name).cloned().ok_or_else(|| {
                StoreError::UnknownMutation {
                    hash: hash.to_string(),
                    name: name.to_string(),
                }
            })?;
            (mutation, Arc::clone(&module.state))
        };

        let (guard, depth) = InFlightGuard::enter(self.id(), hash)?;
        trace!(store = self.label(), hash, mutation = name, depth, "mutating");
        let api = MutationApi::new(self, cascade, hash, state);
        let outcome = mutation(&api, data);
        drop(guard);

        let next = outcome?;
        self.inner.lock().module_mut(hash)?.state = Arc::new(next);
        cascade.complete(hash);
        Ok(())
    }

    // Each combiner reads its inputs when its turn comes, so values written
    // by handlers earlier in the loop are never overwritten by stale ones.
    fn notify(&self, hash: &str) {
        let dependents = self.inner.lock().dependents(hash);
        trace!(
            store = self.label(),
            hash,
            combiners = dependents.len(),
            "notifying"
        );

        for combiner in &dependents {
            let Some((snapshot, handlers)) = self.inner.lock().delivery(combiner) else {
                continue;
            };
            let value = snapshot.resolve();
            for handler in &handlers {
                handler(&*value);
            }
        }

        let Some((state, middlewares)) = self.inner.lock().change(hash) else {
            return;
        };
        let change = StateChange {
            hash,
            state: &*state,
        };
        for middleware in &middlewares {
            middleware(&change);
        }
    }

    /// Run the action `name` of module `hash`.
    ///
    /// The action body runs on the caller's thread; whatever it schedules
    /// asynchronously is outside the store's view. Only errors raised
    /// synchronously by the body are returned here.
    pub fn dispatch(&self, hash: &str, name: &str, data: Option<S>) -> Result<()> {
        let action = {
            let registry = self.inner.lock();
            let module = registry.module(hash)?;
            module
                .actions
                .get(name)
                .cloned()
                .ok_or_else(|| StoreError::UnknownAction {
                    hash: hash.to_string(),
                    name: name.to_string(),
                })?
        };

        trace!(store = self.label(), hash, action = name, "dispatching");
        action(ActionApi::new(self.clone(), hash), data)
    }

    /// Current state of a module.
    pub fn state(&self, hash: &str) -> Result<Arc<S>> {
        let registry = self.inner.lock();
        Ok(Arc::clone(&registry.module(hash)?.state))
    }

    /// Current value of a combiner, computed on demand.
    pub fn combined(&self, hash: &str) -> Result<S> {
        let snapshot = self.inner.lock().snapshot(hash)?;
        Ok(snapshot.resolve().as_ref().clone())
    }

    /// Whether a module is registered under `hash`.
    pub fn has_module(&self, hash: &str) -> bool {
        self.inner.lock().has_module(hash)
    }

    /// Whether a combiner (default or user-defined) exists under `hash`.
    pub fn has_combiner(&self, hash: &str) -> bool {
        self.inner.lock().has_combiner(hash)
    }

    /// Number of live subscriptions on a combiner.
    pub fn subscription_count(&self, hash: &str) -> Result<usize> {
        Ok(self.inner.lock().combiner(hash)?.subscriptions.len())
    }
}

impl<S: Clone + Send + Sync + 'static> Default for Store<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            gate: Arc::clone(&self.gate),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.lock();
        f.debug_struct("Store")
            .field("label", &self.config.label)
            .field("modules", &registry.module_count())
            .field("combiners", &registry.combiner_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntryKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Module<i64> {
        Module::new(0)
            .mutation("increment", |api, _| Ok(api.state() + 1))
            .mutation("add", |api, data| Ok(api.state() + data.unwrap_or(0)))
    }

    #[test]
    fn store_mutate() {
        let store = Store::new();
        store.register("count", counter()).unwrap();

        store.mutate("count", "increment", None).unwrap();
        store.mutate("count", "add", Some(10)).unwrap();

        assert_eq!(*store.state("count").unwrap(), 11);
    }

    #[test]
    fn store_subscribe() {
        let store = Store::new();
        store.register("count", counter()).unwrap();

        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        store
            .subscribe("count", move |_state| {
                call_count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        store.mutate("count", "increment", None).unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 2);

        store.mutate("count", "increment", None).unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn clones_share_state_but_new_stores_are_isolated() {
        let store = Store::new();
        let clone = store.clone();
        let other: Store<i64> = Store::new();

        store.register("count", counter()).unwrap();
        clone.mutate("count", "increment", None).unwrap();

        assert_eq!(*store.state("count").unwrap(), 1);
        assert!(!other.has_module("count"));
        other.register("count", counter()).unwrap();
    }

    #[test]
    fn unknown_names_are_rejected() {
        let store = Store::new();
        store.register("count", counter()).unwrap();

        let err = store.mutate("count", "decrement", None).unwrap_err();
        assert!(matches!(err, StoreError::UnknownMutation { ref name, .. } if name == "decrement"));

        let err = store.dispatch("count", "reset", None).unwrap_err();
        assert!(matches!(err, StoreError::UnknownAction { ref name, .. } if name == "reset"));

        let err = store.mutate("nope", "increment", None).unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                kind: EntryKind::Module,
                ..
            }
        ));
    }

    #[test]
    fn nested_mutation_notifies_after_outer_returns() {
        let store = Store::new();
        store.register("total", counter()).unwrap();
        store
            .register(
                "items",
                Module::new(0).mutation("push", |api, _| {
                    api.mutate("total", "increment", None)?;
                    Ok(api.state() + 1)
                }),
            )
            .unwrap();

        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for hash in ["total", "items"] {
            let order = order.clone();
            store
                .subscribe(hash, move |value| order.lock().push((hash, *value)))
                .unwrap();
        }
        order.lock().clear();

        store.mutate("items", "push", None).unwrap();
        assert_eq!(*order.lock(), vec![("total", 1), ("items", 1)]);
    }

    #[test]
    fn mutation_sees_pre_mutation_state_and_own_hash() {
        let store = Store::new();
        store
            .register(
                "gauge",
                Module::new(5).mutation("check", |api, _| {
                    assert_eq!(api.hash(), "gauge");
                    Ok(api.state() * 2)
                }),
            )
            .unwrap();

        store.mutate("gauge", "check", None).unwrap();
        assert_eq!(*store.state("gauge").unwrap(), 10);
    }

    #[test]
    fn failed_mutation_keeps_state_and_skips_notification() {
        let store = Store::new();
        store
            .register(
                "guarded",
                Module::new(1).mutation("fail", |_, _| Err(StoreError::handler("rejected"))),
            )
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        store
            .subscribe("guarded", move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        let err = store.mutate("guarded", "fail", None).unwrap_err();
        assert_eq!(err.to_string(), "rejected");
        assert_eq!(*store.state("guarded").unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_may_reenter_the_store() {
        let store = Store::new();
        store.register("source", counter()).unwrap();
        store.register("mirror", counter()).unwrap();

        let writer = store.clone();
        store
            .subscribe("source", move |value| {
                if *value > 0 {
                    writer.mutate("mirror", "add", Some(*value)).unwrap();
                }
            })
            .unwrap();

        store.mutate("source", "increment", None).unwrap();
        assert_eq!(*store.state("mirror").unwrap(), 1);
    }

    #[test]
    fn debug_reports_registry_sizes() {
        let store = Store::with_config(StoreConfig::new("ui"));
        store.register("count", counter()).unwrap();
        assert_eq!(
            format!("{:?}", store),
            "Store { label: \"ui\", modules: 1, combiners: 1 }"
        );
    }
}
