//! Crossbar Core — value capabilities, argument coercion, and message descriptors.

pub mod coerce;
pub mod descriptor;
pub mod identity;
pub mod reply;
pub mod value;

pub use coerce::{coerce, CoerceError};
pub use descriptor::{FieldDescriptor, MessageDescriptor};
pub use identity::{Sender, StateReader};
pub use reply::{Reply, ReplyError};
pub use value::{ArgValue, Decode, ValidationResult};
