use super::subscription::{Handler, Middleware, SubscriptionId};
use crate::error::{EntryKind, Result, StoreError};
use crate::module::{ActionFn, Module, MutationFn};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub(crate) type Reducer<S> = Arc<dyn Fn(&[&S]) -> S + Send + Sync>;

pub(crate) struct ModuleEntry<S> {
    pub(crate) state: Arc<S>,
    pub(crate) mutations: HashMap<String, MutationFn<S>>,
    pub(crate) actions: HashMap<String, ActionFn<S>>,
}

pub(crate) enum Projection<S> {
    /// Default combiner: the single module state, passed through.
    Identity,
    Reduce(Reducer<S>),
}

impl<S> Clone for Projection<S> {
    fn clone(&self) -> Self {
        match self {
            Projection::Identity => Projection::Identity,
            Projection::Reduce(reducer) => Projection::Reduce(Arc::clone(reducer)),
        }
    }
}

pub(crate) struct CombinerEntry<S> {
    pub(crate) modules: Vec<String>,
    pub(crate) projection: Projection<S>,
    pub(crate) subscriptions: BTreeMap<SubscriptionId, Handler<S>>,
}

impl<S> CombinerEntry<S> {
    fn depends_on(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }
}

/// Inputs needed to compute a combiner value once the registry lock is released.
pub(crate) struct Snapshot<S> {
    projection: Projection<S>,
    inputs: Vec<Arc<S>>,
}

impl<S: Clone> Snapshot<S> {
    pub(crate) fn resolve(&self) -> Arc<S> {
        match &self.projection {
            Projection::Identity => Arc::clone(&self.inputs[0]),
            Projection::Reduce(reducer) => {
                let states: Vec<&S> = self.inputs.iter().map(Arc::as_ref).collect();
                Arc::new(reducer(&states))
            }
        }
    }
}

/// Modules, combiners and middlewares owned by one store.
///
/// Every method validates fully before touching any map.
pub(crate) struct Registry<S> {
    modules: IndexMap<String, ModuleEntry<S>>,
    combiners: IndexMap<String, CombinerEntry<S>>,
    middlewares: Vec<Middleware<S>>,
    next_subscription: u64,
}

impl<S> Registry<S> {
    pub(crate) fn new() -> Self {
        Self {
            modules: IndexMap::new(),
            combiners: IndexMap::new(),
            middlewares: Vec::new(),
            next_subscription: 0,
        }
    }

    fn is_taken(&self, hash: &str) -> bool {
        self.modules.contains_key(hash) || self.combiners.contains_key(hash)
    }

    pub(crate) fn module(&self, hash: &str) -> Result<&ModuleEntry<S>> {
        self.modules
            .get(hash)
            .ok_or_else(|| StoreError::module_not_found(hash))
    }

    pub(crate) fn module_mut(&mut self, hash: &str) -> Result<&mut ModuleEntry<S>> {
        self.modules
            .get_mut(hash)
            .ok_or_else(|| StoreError::module_not_found(hash))
    }

    pub(crate) fn combiner(&self, hash: &str) -> Result<&CombinerEntry<S>> {
        self.combiners
            .get(hash)
            .ok_or_else(|| StoreError::combiner_not_found(hash))
    }

    pub(crate) fn has_module(&self, hash: &str) -> bool {
        self.modules.contains_key(hash)
    }

    pub(crate) fn has_combiner(&self, hash: &str) -> bool {
        self.combiners.contains_key(hash)
    }

    pub(crate) fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub(crate) fn combiner_count(&self) -> usize {
        self.combiners.len()
    }

    pub(crate) fn register(&mut self, hash: String, module: Module<S>) -> Result<()> {
        if self.is_taken(&hash) {
            return Err(StoreError::DuplicateHash(hash));
        }

        self.combiners.insert(
            hash.clone(),
            CombinerEntry {
                modules: vec![hash.clone()],
                projection: Projection::Identity,
                subscriptions: BTreeMap::new(),
            },
        );
        self.modules.insert(
            hash,
            ModuleEntry {
                state: Arc::new(module.state),
                mutations: module.mutations,
                actions: module.actions,
            },
        );
        Ok(())
    }

    /// Removes the module and its default combiner, dropping any
    /// subscriptions still attached to it. Returns how many were dropped.
    pub(crate) fn unregister(&mut self, hash: &str) -> Result<usize> {
        self.module(hash)?;
        let dependent = self
            .combiners
            .iter()
            .find(|(combiner, entry)| combiner.as_str() != hash && entry.depends_on(hash));
        if let Some((combiner, _)) = dependent {
            return Err(StoreError::DependentCombiner {
                module: hash.to_string(),
                combiner: combiner.clone(),
            });
        }

        self.modules.shift_remove(hash);
        let dropped = self
            .combiners
            .shift_remove(hash)
            .map(|entry| entry.subscriptions.len())
            .unwrap_or(0);
        Ok(dropped)
    }

    pub(crate) fn combine(
        &mut self,
        hash: String,
        modules: Vec<String>,
        reducer: Reducer<S>,
    ) -> Result<()> {
        if self.is_taken(&hash) {
            return Err(StoreError::DuplicateHash(hash));
        }
        for module in &modules {
            self.module(module)?;
        }

        self.combiners.insert(
            hash,
            CombinerEntry {
                modules,
                projection: Projection::Reduce(reducer),
                subscriptions: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub(crate) fn uncombine(&mut self, hash: &str) -> Result<()> {
        let combiner = self.combiner(hash)?;
        if self.modules.contains_key(hash) {
            return Err(StoreError::DefaultCombiner(hash.to_string()));
        }
        if !combiner.subscriptions.is_empty() {
            return Err(StoreError::HasSubscriptions {
                hash: hash.to_string(),
                count: combiner.subscriptions.len(),
            });
        }

        self.combiners.shift_remove(hash);
        Ok(())
    }

    pub(crate) fn snapshot(&self, hash: &str) -> Result<Snapshot<S>> {
        let combiner = self.combiner(hash)?;
        self.snapshot_of(combiner)
    }

    fn snapshot_of(&self, combiner: &CombinerEntry<S>) -> Result<Snapshot<S>> {
        let inputs = combiner
            .modules
            .iter()
            .map(|module| self.module(module).map(|entry| Arc::clone(&entry.state)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Snapshot {
            projection: combiner.projection.clone(),
            inputs,
        })
    }

    pub(crate) fn subscribe(
        &mut self,
        hash: &str,
        handler: Handler<S>,
    ) -> Result<(SubscriptionId, Snapshot<S>)> {
        let snapshot = self.snapshot(hash)?;
        let id = SubscriptionId::new(self.next_subscription);
        let combiner = self
            .combiners
            .get_mut(hash)
            .ok_or_else(|| StoreError::combiner_not_found(hash))?;

        combiner.subscriptions.insert(id, handler);
        self.next_subscription += 1;
        Ok((id, snapshot))
    }

    pub(crate) fn unsubscribe(&mut self, hash: &str, id: SubscriptionId) -> Result<()> {
        let combiner = self
            .combiners
            .get_mut(hash)
            .ok_or_else(|| StoreError::combiner_not_found(hash))?;

        combiner
            .subscriptions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                kind: EntryKind::Subscription,
                id: id.to_string(),
            })
    }

    pub(crate) fn add_middleware(&mut self, middleware: Middleware<S>) {
        self.middlewares.push(middleware);
    }

    /// Hashes of the subscribed combiners that read from `hash`, in
    /// combiner creation order.
    pub(crate) fn dependents(&self, hash: &str) -> Vec<String> {
        self.combiners
            .iter()
            .filter(|(_, combiner)| !combiner.subscriptions.is_empty() && combiner.depends_on(hash))
            .map(|(combiner, _)| combiner.clone())
            .collect()
    }

    /// Current inputs and handlers of one combiner, or `None` if it was
    /// removed or lost its inputs since the notification started.
    pub(crate) fn delivery(&self, hash: &str) -> Option<(Snapshot<S>, Vec<Handler<S>>)> {
        let combiner = self.combiners.get(hash)?;
        let snapshot = self.snapshot_of(combiner).ok()?;
        let handlers = combiner.subscriptions.values().cloned().collect();
        Some((snapshot, handlers))
    }

    /// Current state of `hash` and the middlewares to hand it to.
    pub(crate) fn change(&self, hash: &str) -> Option<(Arc<S>, Vec<Middleware<S>>)> {
        let module = self.modules.get(hash)?;
        Some((Arc::clone(&module.state), self.middlewares.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sum() -> Reducer<i32> {
        Arc::new(|states: &[&i32]| states.iter().copied().sum())
    }

    fn registry_with(hashes: &[&str]) -> Registry<i32> {
        let mut registry = Registry::new();
        for (i, hash) in hashes.iter().enumerate() {
            registry
                .register(hash.to_string(), Module::new(i as i32 + 1))
                .unwrap();
        }
        registry
    }

    #[test]
    fn register_creates_default_combiner() {
        let registry = registry_with(&["a"]);
        assert!(registry.has_module("a"));
        assert!(registry.has_combiner("a"));
        assert_eq!(*registry.snapshot("a").unwrap().resolve(), 1);
    }

    #[test]
    fn combiner_hash_shares_module_namespace() {
        let mut registry = registry_with(&["a", "b"]);
        registry
            .combine("ab".into(), vec!["a".into(), "b".into()], sum())
            .unwrap();

        let err = registry.register("ab".into(), Module::new(0)).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateHash(h) if h == "ab"));

        let err = registry.combine("a".into(), vec![], sum()).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateHash(h) if h == "a"));
    }

    #[test]
    fn combine_requires_registered_modules() {
        let mut registry = registry_with(&["a"]);
        let err = registry
            .combine("ax".into(), vec!["a".into(), "x".into()], sum())
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound { kind: EntryKind::Module, ref id } if id == "x"
        ));
        assert!(!registry.has_combiner("ax"));
    }

    #[test]
    fn failed_unregister_leaves_registry_intact() {
        let mut registry = registry_with(&["a", "b"]);
        registry
            .combine("ab".into(), vec!["a".into(), "b".into()], sum())
            .unwrap();

        let err = registry.unregister("b").unwrap_err();
        assert!(matches!(
            err,
            StoreError::DependentCombiner { ref module, ref combiner } if module == "b" && combiner == "ab"
        ));
        assert!(registry.has_module("b"));
        assert_eq!(*registry.snapshot("ab").unwrap().resolve(), 3);
    }

    #[test]
    fn unregister_drops_default_subscriptions() {
        let mut registry = registry_with(&["a"]);
        registry.subscribe("a", Arc::new(|_: &i32| {})).unwrap();
        registry.subscribe("a", Arc::new(|_: &i32| {})).unwrap();

        assert_eq!(registry.unregister("a").unwrap(), 2);
        assert!(!registry.has_combiner("a"));
        assert_eq!(registry.combiner_count(), 0);
    }

    #[test]
    fn subscription_ids_are_not_reused() {
        let mut registry = registry_with(&["a"]);
        let (first, _) = registry.subscribe("a", Arc::new(|_: &i32| {})).unwrap();
        registry.unsubscribe("a", first).unwrap();
        let (second, _) = registry.subscribe("a", Arc::new(|_: &i32| {})).unwrap();
        assert_ne!(first, second);

        let err = registry.unsubscribe("a", first).unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                kind: EntryKind::Subscription,
                ..
            }
        ));
    }

    #[test]
    fn dependents_skip_unsubscribed_and_unrelated_combiners() {
        let mut registry = registry_with(&["a", "b", "c"]);
        registry
            .combine("ab".into(), vec!["a".into(), "b".into()], sum())
            .unwrap();
        registry
            .combine("bc".into(), vec!["b".into(), "c".into()], sum())
            .unwrap();
        registry.subscribe("ab", Arc::new(|_: &i32| {})).unwrap();
        registry.subscribe("bc", Arc::new(|_: &i32| {})).unwrap();

        assert_eq!(registry.dependents("a"), vec!["ab"]);
        assert_eq!(registry.dependents("b"), vec!["ab", "bc"]);
        assert!(registry.dependents("missing").is_empty());
    }

    #[test]
    fn delivery_reads_current_inputs() {
        let mut registry = registry_with(&["a", "b"]);
        registry
            .combine("ab".into(), vec!["a".into(), "b".into()], sum())
            .unwrap();
        registry.subscribe("ab", Arc::new(|_: &i32| {})).unwrap();
        registry.module_mut("a").unwrap().state = Arc::new(10);

        let (snapshot, handlers) = registry.delivery("ab").unwrap();
        assert_eq!(*snapshot.resolve(), 12);
        assert_eq!(handlers.len(), 1);
        assert!(registry.delivery("gone").is_none());
        assert!(registry.change("gone").is_none());
    }
}
