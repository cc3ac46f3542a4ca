//! Ordered multi-strategy coercion of raw call arguments.
//!
//! Strategy order is part of the contract: a payload valid under more than
//! one strategy always resolves via the earlier one, never by goodness of
//! fit. See [`coerce`] for the exact sequence.

use tracing::trace;

use crate::value::{ArgValue, Decode};

// ---------------------------------------------------------------------------
// CoerceError
// ---------------------------------------------------------------------------

/// Failure to coerce one raw payload into one target shape.
///
/// Produced only after every strategy has been tried.
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot decode payload `{payload}` as {shape}")]
pub struct CoerceError {
    shape: &'static str,
    payload: String,
}

impl CoerceError {
    fn new<T: ArgValue>(raw: &[u8]) -> Self {
        Self {
            shape: T::shape_name(),
            payload: preview(raw),
        }
    }

    /// Name of the target shape.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        self.shape
    }

    /// Bounded preview of the offending payload.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

const PREVIEW_LIMIT: usize = 64;

fn preview(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.chars().count() <= PREVIEW_LIMIT {
        text.into_owned()
    } else {
        let cut: String = text.chars().take(PREVIEW_LIMIT).collect();
        format!("{cut}…")
    }
}

// ---------------------------------------------------------------------------
// coerce
// ---------------------------------------------------------------------------

/// Coerce one raw argument payload into the target shape `T`.
///
/// Strategies are tried in a fixed order, stopping at the first success:
///
/// 1. verbatim text for string-like shapes;
/// 2. structured decode, only when the payload parses as JSON
///    (schema-aware when the shape carries a [`MessageDescriptor`]);
/// 3. the shape's text decode capability, for UTF-8 payloads;
/// 4. the shape's own binary decode capability;
/// 5. generic binary decode (`MsgPack`).
///
/// A strategy that rejects the payload is a normal negative result and
/// falls through to the next one.
///
/// [`MessageDescriptor`]: crate::descriptor::MessageDescriptor
///
/// # Errors
///
/// Returns [`CoerceError`] naming the payload and the target shape when no
/// strategy produces a value.
pub fn coerce<T: ArgValue>(raw: &[u8]) -> Result<T, CoerceError> {
    // String-like fast path. Running it first keeps numeric- and
    // boolean-looking payloads from being misread as structured data.
    if let Some(value) = T::verbatim(raw) {
        return Ok(value);
    }

    // The syntax check runs before any structured decode so non-structured
    // payloads skip straight to the text and binary strategies.
    if let Ok(parsed) = serde_json::from_slice::<serde_json::Value>(raw) {
        match decode_structured::<T>(parsed) {
            Ok(value) => return Ok(value),
            Err(reason) => {
                trace!(shape = T::shape_name(), %reason, "structured decode rejected");
            }
        }
    }

    if let Ok(text) = std::str::from_utf8(raw) {
        match T::decode_text(text) {
            Decode::Value(value) => return Ok(value),
            Decode::Rejected(reason) => {
                trace!(shape = T::shape_name(), %reason, "text decode rejected");
            }
            Decode::Unsupported => {}
        }
    }

    match T::decode_wire(raw) {
        Decode::Value(value) => return Ok(value),
        Decode::Rejected(reason) => {
            trace!(shape = T::shape_name(), %reason, "wire decode rejected");
        }
        Decode::Unsupported => {}
    }

    match rmp_serde::from_slice::<T>(raw) {
        Ok(value) => return Ok(value),
        Err(e) => {
            trace!(shape = T::shape_name(), reason = %e, "binary decode rejected");
        }
    }

    Err(CoerceError::new::<T>(raw))
}

/// Structured decode: schema-aware when the shape is a described message,
/// plain generic decode otherwise.
fn decode_structured<T: ArgValue>(parsed: serde_json::Value) -> Result<T, String> {
    if let Some(descriptor) = T::descriptor() {
        descriptor.check(&parsed)?;
    }
    serde_json::from_value(parsed).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::descriptor::{FieldDescriptor, MessageDescriptor};

    /// Described transfer payload: structured decode is schema-aware.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TransferNote {
        owner: String,
        units: u64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        memo: Option<String>,
    }

    const TRANSFER_NOTE: MessageDescriptor = MessageDescriptor {
        name: "TransferNote",
        fields: &[
            FieldDescriptor {
                name: "owner",
                required: true,
            },
            FieldDescriptor {
                name: "units",
                required: true,
            },
            FieldDescriptor {
                name: "memo",
                required: false,
            },
        ],
    };

    impl ArgValue for TransferNote {
        fn shape_name() -> &'static str {
            "TransferNote"
        }

        fn descriptor() -> Option<&'static MessageDescriptor> {
            Some(&TRANSFER_NOTE)
        }
    }

    /// Carries a text decode capability alongside the descriptor, so a
    /// structured rejection can fall through to the text strategy.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Amount {
        units: u64,
    }

    const AMOUNT: MessageDescriptor = MessageDescriptor {
        name: "Amount",
        fields: &[FieldDescriptor {
            name: "units",
            required: true,
        }],
    };

    impl ArgValue for Amount {
        fn shape_name() -> &'static str {
            "Amount"
        }

        fn descriptor() -> Option<&'static MessageDescriptor> {
            Some(&AMOUNT)
        }

        fn decode_text(raw: &str) -> Decode<Self> {
            match raw.trim().parse::<u64>() {
                Ok(units) => Decode::Value(Self { units }),
                Err(e) => Decode::Rejected(e.to_string()),
            }
        }
    }

    /// Fixed-layout shape with its own binary decode.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Offset(u64);

    impl ArgValue for Offset {
        fn shape_name() -> &'static str {
            "Offset"
        }

        fn decode_wire(raw: &[u8]) -> Decode<Self> {
            match <[u8; 8]>::try_from(raw) {
                Ok(bytes) => Decode::Value(Self(u64::from_be_bytes(bytes))),
                Err(_) => Decode::Rejected(format!("expected 8 bytes, got {}", raw.len())),
            }
        }
    }

    #[test]
    fn string_payload_stays_verbatim() {
        // "123" is also valid structured data; the string fast path wins.
        let value: String = coerce(b"123").unwrap();
        assert_eq!(value, "123");
    }

    #[test]
    fn optional_string_stays_verbatim() {
        let value: Option<String> = coerce(b"{\"not\":\"decoded\"}").unwrap();
        assert_eq!(value.as_deref(), Some("{\"not\":\"decoded\"}"));
    }

    #[test]
    fn structured_payload_decodes_into_described_shape() {
        let note: TransferNote = coerce(br#"{"owner":"alice","units":10}"#).unwrap();
        assert_eq!(note.owner, "alice");
        assert_eq!(note.units, 10);
        assert_eq!(note.memo, None);
    }

    #[test]
    fn described_shape_rejects_unknown_fields() {
        let err = coerce::<TransferNote>(br#"{"owner":"alice","units":1,"extra":true}"#)
            .unwrap_err();
        assert_eq!(err.shape(), "TransferNote");
    }

    #[test]
    fn structured_rejection_falls_through_to_text() {
        // "250" is valid structured data but not an Amount object; the
        // pipeline falls through to the text capability instead of failing.
        let amount: Amount = coerce(b"250").unwrap();
        assert_eq!(amount, Amount { units: 250 });
    }

    #[test]
    fn wire_capability_decodes_fixed_layout() {
        let raw = 300u64.to_be_bytes();
        let offset: Offset = coerce(&raw).unwrap();
        assert_eq!(offset, Offset(300));
    }

    #[test]
    fn generic_binary_decode_is_the_last_resort() {
        let note = TransferNote {
            owner: "bob".to_string(),
            units: 77,
            memo: Some("rent".to_string()),
        };
        let raw = rmp_serde::to_vec_named(&note).unwrap();
        let decoded: TransferNote = coerce(&raw).unwrap();
        assert_eq!(decoded, note);
    }

    #[test]
    fn exhausted_pipeline_names_payload_and_shape() {
        let err = coerce::<TransferNote>(b"not structured at all").unwrap_err();
        assert_eq!(err.shape(), "TransferNote");
        assert_eq!(err.payload(), "not structured at all");
        let rendered = err.to_string();
        assert!(rendered.contains("TransferNote"), "{rendered}");
        assert!(rendered.contains("not structured at all"), "{rendered}");
    }

    #[test]
    fn long_payloads_are_previewed_bounded() {
        let raw = vec![b'x'; 500];
        let err = coerce::<TransferNote>(&raw).unwrap_err();
        assert!(err.payload().chars().count() <= PREVIEW_LIMIT + 1);
    }

    #[test]
    fn coercion_is_deterministic() {
        let raw = br#"{"owner":"carol","units":3}"#;
        let first: TransferNote = coerce(raw).unwrap();
        let second: TransferNote = coerce(raw).unwrap();
        assert_eq!(first, second);
    }

    proptest! {
        /// Structured round-trip: encode then coerce restores the value.
        #[test]
        fn structured_round_trip(
            owner in "[a-z]{1,12}",
            units in 0u64..1_000_000,
            memo in proptest::option::of("[ -~]{0,24}"),
        ) {
            let note = TransferNote { owner, units, memo };
            let encoded = serde_json::to_vec(&note).unwrap();
            let decoded: TransferNote = coerce(&encoded).unwrap();
            prop_assert_eq!(decoded, note);
        }
    }
}
