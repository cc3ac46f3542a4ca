use serde::{Deserialize, Serialize};

/// Classification of an endpoint's effect on state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodCategory {
    /// Mutates state through the batched write path. Authenticated by
    /// default under schema discovery.
    MutatingBatched,
    /// Mutates state immediately, outside the batched path.
    MutatingImmediate,
    /// Reads state without mutating it.
    ReadOnly,
}

/// Metadata describing one externally callable operation.
///
/// Built once during discovery and never mutated. The external dispatcher
/// reads these fields to construct its own calling convention, e.g.
/// prepending a verified identity before forwarding raw arguments to an
/// `auth_required` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// External name callers use to address the operation.
    pub name: String,
    /// Effect classification.
    pub category: MethodCategory,
    /// Whether the first call argument is a verified caller identity.
    pub auth_required: bool,
    /// Declared arity, counting the identity slot when `auth_required`.
    pub arg_count: usize,
    /// Whether the bound operation's return shape ends in an error slot.
    pub returns_error: bool,
}
