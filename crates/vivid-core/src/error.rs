//! Error types for chain construction and processing.

use thiserror::Error;

use crate::operator::OutputKind;

/// Errors raised by [`Chain`](crate::Chain) operations.
///
/// Only [`CycleDetected`](ChainError::CycleDetected) and
/// [`DuplicateName`](ChainError::DuplicateName) reject the offending
/// mutation; the resolution errors are recorded on the chain's error buffer
/// and the affected input slot runs as absent, so the frame still produces
/// output. The `Display` form of each variant starts with its taxonomy tag
/// so hosts can grep the accumulated error text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Connecting these two operators would close a cycle.
    #[error("CycleDetected: connecting '{producer}' into '{consumer}' would close a cycle")]
    CycleDetected {
        /// The operator whose input was being set.
        consumer: String,
        /// The operator that would have fed it.
        producer: String,
    },

    /// An operator with this name already exists in the chain.
    #[error("DuplicateName: operator '{0}' already exists")]
    DuplicateName(String),

    /// An input name did not resolve to any operator in the chain.
    #[error("UnknownInput: '{consumer}' input {slot} references unknown operator '{name}'")]
    UnknownInput {
        /// The operator holding the dangling reference.
        consumer: String,
        /// Input slot index.
        slot: usize,
        /// The unresolved name.
        name: String,
    },

    /// A resolved input's output kind is not accepted by the slot.
    #[error(
        "KindMismatch: '{consumer}' input {slot} does not accept {actual:?} (from '{producer}')"
    )]
    KindMismatch {
        /// The operator holding the connection.
        consumer: String,
        /// Input slot index.
        slot: usize,
        /// The connected operator.
        producer: String,
        /// The kind the producer outputs.
        actual: OutputKind,
    },

    /// The named operator does not exist in the chain.
    #[error("UnknownOperator: no operator named '{0}'")]
    UnknownOperator(String),

    /// The operator does not expose the requested input slot.
    #[error("InvalidSlot: '{consumer}' has no input slot {slot}")]
    InvalidSlot {
        /// The operator whose input was being set.
        consumer: String,
        /// The out-of-range slot index.
        slot: usize,
    },
}
