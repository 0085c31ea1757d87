use std::fmt;
use thiserror::Error;

/// Boxed error raised from inside a mutation or action body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The kind of registry entry a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Module,
    Combiner,
    Subscription,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Module => f.write_str("module"),
            EntryKind::Combiner => f.write_str("combiner"),
            EntryKind::Subscription => f.write_str("subscription"),
        }
    }
}

/// Errors returned by [`Store`](crate::Store) operations.
///
/// Every variant except [`StoreError::Handler`] is a contract violation
/// detected before the registry is touched.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("hash `{0}` is already in use by a module or combiner")]
    DuplicateHash(String),

    #[error("{kind} `{id}` not found")]
    NotFound { kind: EntryKind, id: String },

    #[error("module `{module}` is still referenced by combiner `{combiner}`")]
    DependentCombiner { module: String, combiner: String },

    #[error("combiner `{0}` belongs to a registered module and cannot be uncombined")]
    DefaultCombiner(String),

    #[error("combiner `{hash}` still has {count} active subscription(s)")]
    HasSubscriptions { hash: String, count: usize },

    #[error("module `{hash}` has no mutation named `{name}`")]
    UnknownMutation { hash: String, name: String },

    #[error("module `{hash}` has no action named `{name}`")]
    UnknownAction { hash: String, name: String },

    #[error("module `{hash}` is already mutating (cascade: {})", .stack.join(" -> "))]
    CircularMutation { hash: String, stack: Vec<String> },

    #[error(transparent)]
    Handler(BoxError),
}

impl StoreError {
    /// Wrap an error raised by user code inside a mutation or action.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        StoreError::Handler(err.into())
    }

    pub(crate) fn module_not_found(hash: &str) -> Self {
        StoreError::NotFound {
            kind: EntryKind::Module,
            id: hash.to_string(),
        }
    }

    pub(crate) fn combiner_not_found(hash: &str) -> Self {
        StoreError::NotFound {
            kind: EntryKind::Combiner,
            id: hash.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_entry() {
        let err = StoreError::module_not_found("todos");
        assert_eq!(err.to_string(), "module `todos` not found");

        let err = StoreError::CircularMutation {
            hash: "a".into(),
            stack: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "module `a` is already mutating (cascade: a -> b)"
        );
    }

    #[test]
    fn handler_errors_are_transparent() {
        let err = StoreError::handler("quota exceeded");
        assert_eq!(err.to_string(), "quota exceeded");
    }
}
