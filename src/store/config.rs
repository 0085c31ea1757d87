/// Construction-time settings for a [`Store`](super::Store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Attached as the `store` field of every log event, so that several
    /// stores in one process can be told apart.
    pub label: String,
}

impl StoreConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new("store")
    }
}
