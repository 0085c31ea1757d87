//! The store engine.
//!
//! A [`Store`] owns a registry of modules and combiners plus a list of
//! middlewares. Modules hold state and are changed through named
//! mutations; combiners project one or more module states into a value
//! that can be subscribed to. Every registered module gets a default
//! combiner under its own hash.

mod action;
mod config;
mod mutation;
mod registry;
mod store;
mod subscription;

pub use action::ActionApi;
pub use config::StoreConfig;
pub use mutation::MutationApi;
pub use store::Store;
pub use subscription::{StateChange, SubscriptionId};
