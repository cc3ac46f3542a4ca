use std::time::Instant;

use crossbar_core::Sender;

/// Per-call context forwarded to the wrapped operation.
///
/// The router fills the `caller` slot for authenticated calls and forwards
/// everything else untouched; it never originates timeouts or retries.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Verified caller identity. Set by the router from the first raw
    /// argument of an `auth_required` call, for the call's duration only.
    pub caller: Option<Sender>,
    /// Dispatcher-assigned call identifier, for logs and correlation.
    pub call_id: u64,
    /// Deadline set by the external caller. Wrapped operations may honor
    /// it; the router does not act on it.
    pub deadline: Option<Instant>,
}

impl CallContext {
    #[must_use]
    pub fn new(call_id: u64) -> Self {
        Self {
            call_id,
            ..Self::default()
        }
    }
}
