/// Errors returned by discovery, composition, and per-call dispatch.
///
/// Discovery-time errors (`MethodAlreadyDefined`, `InvalidMethodName`) are
/// fatal: constructors return them synchronously and no partial registry
/// ever exists. Per-call errors go back to the immediate caller; nothing in
/// this crate retries.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// No endpoint with this name, and no fallback that has one.
    #[error("unsupported method: {method}")]
    UnsupportedMethod { method: String },

    /// Caller supplied the wrong number of raw arguments.
    #[error("invalid number of arguments for `{method}`: expected {expected}, got {got}")]
    InvalidNumberOfArguments {
        method: String,
        expected: usize,
        got: usize,
    },

    /// An argument failed coercion or validation.
    #[error("invalid value for argument {index} of `{method}`: {reason}")]
    InvalidArgumentValue {
        method: String,
        index: usize,
        reason: String,
    },

    /// Name collision at discovery or compose time.
    #[error("method already defined: {method}")]
    MethodAlreadyDefined { method: String },

    /// Convention stripping produced an empty external name.
    #[error("declared operation `{declared}` yields an empty method name")]
    InvalidMethodName { declared: String },

    /// The wrapped operation's own business error, passed through unwrapped.
    #[error(transparent)]
    Operation(#[from] anyhow::Error),
}
