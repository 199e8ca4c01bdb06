//! Errors of the secure aggregation protocol.
//!
//! Every error is fatal for the round it occurs in: there is no partial aggregate, since a sum
//! over a subset of the selected participants leaks the excluded inputs by omission.

use thiserror::Error;

use crate::ParticipantId;

/// A specialized result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors related to key setup, encoding and decoding.
pub enum ProtocolError {
    #[error("the operand is not a valid group element")]
    InvalidPoint,

    #[error("the value is not invertible modulo the group modulus")]
    NoInverse,

    #[error("no invertible matrix found after {attempts} attempts")]
    KeyGenerationFailure { attempts: usize },

    #[error("{actual} weights do not fit into a matrix of {expected} cells")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("a weight is not finite or exceeds the fixed-point range")]
    WeightOutOfRange,

    #[error("expected a {expected}x{expected} matrix, got {rows}x{cols}")]
    ShapeMismatch {
        expected: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{0} has not submitted its contribution")]
    MissingContribution(ParticipantId),

    #[error("{0} is not selected for this round")]
    UnknownParticipant(ParticipantId),

    #[error("{0} has already submitted its contribution")]
    DuplicateContribution(ParticipantId),

    #[error("{0} has not published a public key share")]
    MissingPublicKey(ParticipantId),

    #[error("the participant set is empty")]
    EmptyParticipantSet,

    #[error("no discrete logarithm below {bound}")]
    DiscreteLogNotFound { bound: u64 },

    #[error("more than one discrete logarithm below {bound}")]
    AmbiguousDiscreteLog { bound: u64 },

    #[error("the key was derived for a different participant set")]
    StaleCollectiveKey,

    #[error("malformed message: {0}")]
    MalformedMessage(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
