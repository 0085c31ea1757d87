use super::Store;
use crate::error::{Result, StoreError};
use std::cell::RefCell;
use std::sync::Arc;

// Hashes currently inside their mutation function on this thread, tagged
// with the identity of the store they belong to, outermost first.
thread_local! {
    static IN_FLIGHT: RefCell<Vec<(usize, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks `hash` of store `store_id` as mutating on this thread until dropped.
///
/// Every entry point (nested through [`MutationApi::mutate`] or a direct
/// [`Store::mutate`] on a captured handle) goes through here, so a module can
/// never re-enter itself on one call stack.
pub(crate) struct InFlightGuard {
    store_id: usize,
}

impl InFlightGuard {
    pub(crate) fn enter(store_id: usize, hash: &str) -> Result<(Self, usize)> {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            let own: Vec<String> = stack
                .iter()
                .filter(|(id, _)| *id == store_id)
                .map(|(_, h)| h.clone())
                .collect();

            if own.iter().any(|h| h == hash) {
                return Err(StoreError::CircularMutation {
                    hash: hash.to_string(),
                    stack: own,
                });
            }

            stack.push((store_id, hash.to_string()));
            Ok((Self { store_id }, own.len() + 1))
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        IN_FLIGHT.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|(id, _)| *id == self.store_id) {
                stack.remove(pos);
            }
        });
    }
}

/// Modules changed during one top-level `mutate` call, deduplicated, in
/// completion order.
#[derive(Default)]
pub(crate) struct Cascade {
    completed: RefCell<Vec<String>>,
}

impl Cascade {
    pub(crate) fn complete(&self, hash: &str) {
        let mut completed = self.completed.borrow_mut();
        if !completed.iter().any(|h| h == hash) {
            completed.push(hash.to_string());
        }
    }

    pub(crate) fn into_completed(self) -> Vec<String> {
        self.completed.into_inner()
    }
}

/// What a mutation function can see and do.
///
/// Only `mutate` is offered: structural operations are unavailable while a
/// mutation runs.
pub struct MutationApi<'a, S> {
    store: &'a Store<S>,
    cascade: &'a Cascade,
    hash: &'a str,
    state: Arc<S>,
}

impl<'a, S: Clone + Send + Sync + 'static> MutationApi<'a, S> {
    pub(crate) fn new(
        store: &'a Store<S>,
        cascade: &'a Cascade,
        hash: &'a str,
        state: Arc<S>,
    ) -> Self {
        Self {
            store,
            cascade,
            hash,
            state,
        }
    }

    /// Hash of the module being mutated.
    pub fn hash(&self) -> &str {
        self.hash
    }

    /// The module state before this mutation.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Run another module's mutation as part of the same cascade.
    ///
    /// Fails with [`StoreError::CircularMutation`] if `hash` is already
    /// mutating further up the call stack. Subscribers are notified once
    /// the outermost `mutate` returns.
    pub fn mutate(&self, hash: &str, name: &str, data: Option<S>) -> Result<()> {
        self.store.apply_mutation(self.cascade, hash, name, data)
    }
}
