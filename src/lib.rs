//! # Statehub
//!
//! A minimal, framework-agnostic global state container.
//!
//! State lives in independently registered **modules**. Each module is
//! changed only through its named **mutations**: pure, synchronous
//! functions from the current state to the next one. **Actions** orchestrate
//! work that may finish later, calling back into the store as they go.
//!
//! **Combiners** project one or more module states through a reducer into a
//! single value that can be subscribed to. Every module gets a default
//! combiner under its own hash, so subscribing to a module is subscribing to
//! that combiner. **Middlewares** observe every change, store-wide.
//!
//! ```
//! use statehub::{Module, Store};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum State {
//!     Count(i64),
//!     Name(String),
//!     Label(String),
//! }
//!
//! let store = Store::new();
//! store
//!     .register(
//!         "count",
//!         Module::new(State::Count(0)).mutation("increment", |api, _| match api.state() {
//!             State::Count(n) => Ok(State::Count(n + 1)),
//!             other => Ok(other.clone()),
//!         }),
//!     )
//!     .unwrap();
//! store.register("name", Module::new(State::Name("clicks".into()))).unwrap();
//! store
//!     .combine("label", ["count", "name"], |states| match states {
//!         [State::Count(n), State::Name(name)] => State::Label(format!("{name}: {n}")),
//!         _ => State::Label(String::new()),
//!     })
//!     .unwrap();
//!
//! store.mutate("count", "increment", None).unwrap();
//! assert_eq!(store.combined("label").unwrap(), State::Label("clicks: 1".into()));
//! ```

pub mod error;
pub mod middleware;
pub mod module;
pub mod store;

// Re-export main types for convenience
pub use error::{BoxError, EntryKind, Result, StoreError};
pub use module::Module;
pub use store::{ActionApi, MutationApi, StateChange, Store, StoreConfig, SubscriptionId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let store = Store::new();
        store
            .register("n", Module::new(0).mutation("set", |_, data| Ok(data.unwrap_or(0))))
            .unwrap();
        store.mutate("n", "set", Some(42)).unwrap();
        assert_eq!(*store.state("n").unwrap(), 42);
    }
}
