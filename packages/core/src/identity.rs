use serde::{Deserialize, Serialize};

/// Verified caller identity for authenticated endpoints.
///
/// The external dispatcher verifies signatures and ACLs before dispatch and
/// prepends the identity as the first raw argument of authenticated calls.
/// The router carries it through the call context; it never verifies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sender {
    id: String,
}

impl Sender {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Stable identifier of the authenticated caller.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Read-only view of external state, used by context-aware argument
/// validation. Implementations: storage engines, test fixtures.
pub trait StateReader: Send + Sync {
    /// Load the raw value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Whether `key` exists.
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
