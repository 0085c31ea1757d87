//! State modules.
//!
//! A module bundles an initial state with the named mutations and actions
//! that operate on it. Modules are registered into a [`Store`](crate::Store)
//! under a unique hash.

mod module;

pub use module::Module;
pub(crate) use module::{ActionFn, MutationFn};
