// SPDX-FileCopyrightText: 2026 Trellis Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for Trellis.
//!
//! Provides the error taxonomy, tagged values, state containers with
//! recursive composition, file persistence, and the conversation types used
//! at the model boundary. Every other crate in the workspace builds on these.

pub mod error;
pub mod module;
pub mod operator;
pub mod persist;
pub mod traits;
pub mod types;
pub mod value;

// Re-export key items at crate root for ergonomic imports.
pub use error::{TrellisError, ValidationDetails};
pub use module::Children;
pub use operator::{FieldSpec, Operator, StateDict};
pub use persist::{Persist, StateDocument, StateFormat, StateMetadata};
pub use traits::ConversationModel;
pub use types::{Conversation, Message, Role, ToolCallRequest};
pub use value::{TypedValue, ValueKind, ValueSet};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_kind_has_a_distinct_type_name() {
        let errors = [
            TrellisError::Validation {
                details: ValidationDetails::new(),
            },
            TrellisError::UnknownCapability { name: "x".into() },
            TrellisError::UnknownField {
                container: "c".into(),
                field: "f".into(),
            },
            TrellisError::UnknownChild {
                container: "c".into(),
                child: "k".into(),
            },
            TrellisError::DuplicateName { name: "x".into() },
            TrellisError::InvalidName {
                name: "".into(),
                reason: "empty".into(),
            },
            TrellisError::RemoteTimeout {
                method: "tools/call".into(),
                duration: std::time::Duration::from_secs(1),
            },
            TrellisError::protocol("closed"),
            TrellisError::Io(std::io::Error::other("io")),
            TrellisError::Deserialization {
                message: "bad".into(),
                source: None,
            },
            TrellisError::Serialization {
                message: "bad".into(),
                source: None,
            },
            TrellisError::Timeout {
                duration: std::time::Duration::from_secs(1),
            },
            TrellisError::execution("boom"),
            TrellisError::Config("c".into()),
            TrellisError::Internal("i".into()),
        ];
        let mut kinds: Vec<&str> = errors.iter().map(TrellisError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn operator_is_object_safe() {
        fn _assert_dyn(_: &dyn Operator) {}
        fn _assert_model(_: &dyn ConversationModel) {}
    }
}
