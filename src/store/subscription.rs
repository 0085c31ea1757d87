use std::fmt;
use std::sync::Arc;

pub(crate) type Handler<S> = Arc<dyn Fn(&S) + Send + Sync>;
pub(crate) type Middleware<S> = Arc<dyn Fn(&StateChange<'_, S>) + Send + Sync>;

/// Identifies one subscription on one combiner.
///
/// Ids come from a per-store counter and are never handed out twice, so
/// ordering by id is ordering by subscription time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Payload handed to every middleware after a module changes.
#[derive(Debug)]
pub struct StateChange<'a, S> {
    /// Hash of the module that was mutated.
    pub hash: &'a str,
    /// The module's state after the mutation.
    pub state: &'a S,
}
