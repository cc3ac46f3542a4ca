//! Reply encoding: uniform byte encoding of operation results, with
//! trailing-error splitting expressed through the `Result` impl.

use serde::Serialize;

// ---------------------------------------------------------------------------
// ReplyError
// ---------------------------------------------------------------------------

/// Errors from turning an operation's return value into reply bytes.
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    /// Structured encoding of the result failed.
    #[error("failed to encode reply: {0}")]
    Encode(#[from] serde_json::Error),
    /// The operation returned its own business error.
    #[error(transparent)]
    Operation(anyhow::Error),
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A value an operation can return through the dispatch pipeline.
///
/// Encoding rules:
/// - `()` encodes as the literal bytes `null`.
/// - Tuples encode as an ordered structured sequence.
/// - `Result<T, E>` marks the operation as error-returning: `Err` aborts the
///   call with the business error untouched, `Ok` encodes the value alone.
/// - A single plain value encodes via [`json`]; a value with its own wire
///   encoding (e.g. `Vec<u8>`) hands back its bytes directly.
pub trait Reply: Send + 'static {
    /// Whether this return shape ends in an error slot.
    const RETURNS_ERROR: bool = false;

    /// Consume the value and produce the reply bytes.
    ///
    /// # Errors
    ///
    /// Returns `ReplyError::Operation` for a business error carried by a
    /// `Result` return, `ReplyError::Encode` when structured encoding fails.
    fn encode(self) -> Result<Vec<u8>, ReplyError>;
}

/// Structured-encode a single reply value.
///
/// # Errors
///
/// Returns `ReplyError::Encode` when serialization fails.
pub fn json<T: Serialize>(value: &T) -> Result<Vec<u8>, ReplyError> {
    Ok(serde_json::to_vec(value)?)
}

impl Reply for () {
    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        Ok(b"null".to_vec())
    }
}

/// Raw bytes pass through as the operation's own wire encoding.
impl Reply for Vec<u8> {
    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        Ok(self)
    }
}

impl Reply for String {
    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        json(&self)
    }
}

impl Reply for bool {
    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        json(&self)
    }
}

impl Reply for u64 {
    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        json(&self)
    }
}

impl Reply for i64 {
    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        json(&self)
    }
}

impl Reply for serde_json::Value {
    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        json(&self)
    }
}

impl<A, B> Reply for (A, B)
where
    A: Serialize + Send + 'static,
    B: Serialize + Send + 'static,
{
    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        json(&self)
    }
}

impl<A, B, C> Reply for (A, B, C)
where
    A: Serialize + Send + 'static,
    B: Serialize + Send + 'static,
    C: Serialize + Send + 'static,
{
    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        json(&self)
    }
}

impl<T, E> Reply for Result<T, E>
where
    T: Reply,
    E: Into<anyhow::Error> + Send + 'static,
{
    const RETURNS_ERROR: bool = true;

    fn encode(self) -> Result<Vec<u8>, ReplyError> {
        match self {
            Ok(value) => value.encode(),
            Err(err) => Err(ReplyError::Operation(err.into())),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
