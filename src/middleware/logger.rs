use crate::store::StateChange;
use std::fmt;
use tracing::info;

/// A middleware that logs every state change as a `tracing` event.
///
/// Events are emitted at INFO level under the `statehub::change` target
/// with the module `hash` and its new `state` as fields.
///
/// # Examples
///
/// ```
/// use statehub::{middleware, Module, Store};
///
/// let store = Store::new();
/// store.use_middleware(middleware::logger::<bool>());
/// store
///     .register("flag", Module::new(false).mutation("toggle", |api, _| Ok(!api.state())))
///     .unwrap();
/// store.mutate("flag", "toggle", None).unwrap();
/// ```
pub fn logger<S>() -> impl Fn(&StateChange<'_, S>) + Send + Sync + 'static
where
    S: fmt::Debug + 'static,
{
    |change: &StateChange<'_, S>| {
        info!(
            target: "statehub::change",
            hash = change.hash,
            state = ?change.state,
            "state changed"
        );
    }
}
