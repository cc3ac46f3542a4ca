//! Router abstraction exposed to the external dispatcher.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::context::CallContext;
use crate::endpoint::Endpoint;
use crate::error::RouterError;

/// A built, immutable table of string-named endpoints.
///
/// Implementations are constructed once at service start and never mutated
/// afterward; `check` and `invoke` only read the table, so a router behind
/// an `Arc` serves any number of concurrent callers without locking. The
/// router never blocks except through the wrapped operation.
#[async_trait]
pub trait MethodRouter: Send + Sync {
    /// The full endpoint table, keyed by external name.
    fn methods(&self) -> &HashMap<String, Endpoint>;

    /// Validate a call without invoking it: endpoint lookup, arity check,
    /// payload decode, and argument validation.
    ///
    /// # Errors
    ///
    /// `UnsupportedMethod`, `InvalidNumberOfArguments`, or
    /// `InvalidArgumentValue`.
    fn check(&self, method: &str, args: &[Bytes]) -> Result<(), RouterError>;

    /// Dispatch a call to the bound operation and encode its result.
    ///
    /// # Errors
    ///
    /// The same lookup and argument errors as `check`, plus the wrapped
    /// operation's own business error passed through unwrapped.
    async fn invoke(
        &self,
        ctx: CallContext,
        method: &str,
        args: &[Bytes],
    ) -> Result<Bytes, RouterError>;
}
