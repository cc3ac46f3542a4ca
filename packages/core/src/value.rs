use serde::de::DeserializeOwned;

use crate::descriptor::MessageDescriptor;
use crate::identity::StateReader;

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Outcome of one decode strategy applied to one raw payload.
///
/// `Rejected` and `Unsupported` are both normal negative results: the
/// coercion pipeline records them and moves on to the next strategy.
#[derive(Debug)]
pub enum Decode<T> {
    /// The strategy produced a value.
    Value(T),
    /// The shape implements this strategy but the payload did not fit.
    Rejected(String),
    /// The shape does not implement this strategy.
    Unsupported,
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// Result of validating a decoded argument value.
#[derive(Debug, Clone)]
pub enum ValidationResult {
    /// The value satisfies its own constraints.
    Valid,
    /// The value violates one or more constraints.
    Invalid {
        /// Human-readable descriptions of each violation.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    /// Single-message rejection.
    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self::Invalid {
            errors: vec![error.into()],
        }
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Joined failure messages, or `None` when valid.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Valid => None,
            Self::Invalid { errors } => Some(errors.join("; ")),
        }
    }
}

// ---------------------------------------------------------------------------
// ArgValue
// ---------------------------------------------------------------------------

/// A statically shaped value that can be produced from one raw call argument.
///
/// Every implementor gets the generic structured (JSON) and generic binary
/// (`MsgPack`) decode strategies for free through the `DeserializeOwned`
/// supertrait. The remaining hooks are optional capabilities: the coercion
/// pipeline probes them in a fixed order but requires none of them.
pub trait ArgValue: DeserializeOwned + Send + Sized + 'static {
    /// Shape name used in diagnostics.
    #[must_use]
    fn shape_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// String-like shapes take the raw payload verbatim, before any other
    /// strategy runs. Returning `Some` short-circuits the whole pipeline.
    #[must_use]
    fn verbatim(_raw: &[u8]) -> Option<Self> {
        None
    }

    /// Field-level schema for the schema-aware structured decode step.
    #[must_use]
    fn descriptor() -> Option<&'static MessageDescriptor> {
        None
    }

    /// Text decode capability (e.g. `FromStr`-backed scalars). The pipeline
    /// only calls this for payloads that are valid UTF-8.
    fn decode_text(_raw: &str) -> Decode<Self> {
        Decode::Unsupported
    }

    /// Shape-specific binary decode capability.
    fn decode_wire(_raw: &[u8]) -> Decode<Self> {
        Decode::Unsupported
    }

    /// Stateless self-validation, run by `check` after decoding.
    fn validate(&self) -> ValidationResult {
        ValidationResult::Valid
    }

    /// Context-aware validation against an external state accessor, run by
    /// `check` only when the router was given one.
    fn validate_with(&self, _state: &dyn StateReader) -> ValidationResult {
        ValidationResult::Valid
    }
}

// ---------------------------------------------------------------------------
// String-like shapes
// ---------------------------------------------------------------------------

impl ArgValue for String {
    fn shape_name() -> &'static str {
        "string"
    }

    fn verbatim(raw: &[u8]) -> Option<Self> {
        String::from_utf8(raw.to_vec()).ok()
    }
}

impl ArgValue for Option<String> {
    fn shape_name() -> &'static str {
        "optional string"
    }

    fn verbatim(raw: &[u8]) -> Option<Self> {
        String::from_utf8(raw.to_vec()).ok().map(Some)
    }
}

// ---------------------------------------------------------------------------
// Scalar shapes
// ---------------------------------------------------------------------------

macro_rules! scalar_arg_value {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(impl ArgValue for $ty {
            fn shape_name() -> &'static str {
                $name
            }

            fn decode_text(raw: &str) -> Decode<Self> {
                match raw.trim().parse::<$ty>() {
                    Ok(value) => Decode::Value(value),
                    Err(e) => Decode::Rejected(e.to_string()),
                }
            }
        })*
    };
}

scalar_arg_value! {
    bool => "bool",
    i64 => "i64",
    u32 => "u32",
    u64 => "u64",
    f64 => "f64",
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
