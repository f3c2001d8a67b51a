//! Error types for the proposal domain

use crate::status::ProposalStatus;

/// Rejected state machine transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition from {from} to {to}")]
pub struct TransitionError {
    /// Status the proposal was in
    pub from: ProposalStatus,
    /// Status that was requested
    pub to: ProposalStatus,
}

/// Proposal content failed validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    /// A required field is blank
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    /// A field exceeds its length cap
    #[error("{field} exceeds {max} characters")]
    TooLong {
        /// Offending field
        field: &'static str,
        /// Configured maximum
        max: usize,
    },

    /// Attached file descriptor is malformed
    #[error("invalid attachment: {0}")]
    InvalidAttachment(&'static str),
}

/// Failed to parse a stored enum value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    /// Enum being parsed
    pub kind: &'static str,
    /// Raw value
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
