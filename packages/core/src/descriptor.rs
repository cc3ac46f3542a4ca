//! Described-message capability: static field-level schemas used by the
//! schema-aware structured decode strategy.

/// Static description of a structured message shape.
///
/// A shape that returns one of these from `ArgValue::descriptor` opts into
/// schema-aware structured decoding: the payload must be an object, every
/// required field must be present, and unknown fields are rejected before
/// the generic decode runs.
#[derive(Debug, Clone, Copy)]
pub struct MessageDescriptor {
    /// Message name used in diagnostics.
    pub name: &'static str,
    /// Field definitions that comprise this message.
    pub fields: &'static [FieldDescriptor],
}

/// Single field definition within a message descriptor.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Name of the field as it appears in the structured payload.
    pub name: &'static str,
    /// Whether the field must be present in every payload.
    pub required: bool,
}

impl MessageDescriptor {
    /// Check a parsed structured payload against this descriptor.
    ///
    /// # Errors
    ///
    /// Returns a human-readable description of the first violation: a
    /// non-object payload, a missing required field, or an unknown field.
    pub fn check(&self, value: &serde_json::Value) -> Result<(), String> {
        let Some(object) = value.as_object() else {
            return Err(format!("`{}` expects an object payload", self.name));
        };
        for field in self.fields {
            if field.required && !object.contains_key(field.name) {
                return Err(format!(
                    "`{}` is missing required field `{}`",
                    self.name, field.name
                ));
            }
        }
        for key in object.keys() {
            if !self.fields.iter().any(|f| f.name == key) {
                return Err(format!("`{}` has no field `{key}`", self.name));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
