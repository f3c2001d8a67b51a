//! Error types for the lifecycle engine
//!
//! Every failure a caller can observe is a [`LifecycleError`]. Each kind has
//! a stable string code and an HTTP-like status so that outer layers can map
//! errors without matching on messages.

use proposal_core::{ContentError, ProposalStatus, TransitionError};
use proposal_store::StoreError;
use std::fmt;

use crate::collaborators::CollaboratorError;

/// Entity that could not be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Proposal
    Proposal,
    /// Proposal version
    Version,
    /// Team in the external directory
    Team,
    /// Derived project
    Project,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Proposal => "proposal",
            Self::Version => "version",
            Self::Team => "team",
            Self::Project => "project",
        })
    }
}

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Entity does not exist (or is archived)
    #[error("{0} not found")]
    NotFound(EntityKind),

    /// Actor lacks the required role or relationship
    #[error("not permitted to {action}")]
    Forbidden {
        /// What the actor tried to do
        action: &'static str,
    },

    /// Operation is not allowed in the proposal's current status
    #[error("cannot {operation} while proposal is {status}")]
    InvalidState {
        /// Attempted operation
        operation: &'static str,
        /// Status at the time of the attempt
        status: ProposalStatus,
    },

    /// Requested status change is not in the transition table
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Uniqueness rule violated, possibly by a concurrent request
    #[error("conflict: {0}")]
    Conflict(String),

    /// A business precondition does not hold yet
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Malformed content, justification or upload
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Datastore failure; nothing was written
    #[error("storage unavailable")]
    Storage(#[source] StoreError),

    /// External collaborator failed
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] CollaboratorError),
}

impl LifecycleError {
    /// Forbidden helper
    #[inline]
    #[must_use]
    pub fn forbidden(action: &'static str) -> Self {
        Self::Forbidden { action }
    }

    /// Invalid state helper
    #[inline]
    #[must_use]
    pub fn invalid_state(operation: &'static str, status: ProposalStatus) -> Self {
        Self::InvalidState { operation, status }
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::InvalidState { .. } => "invalid_state",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Conflict(_) => "conflict",
            Self::Precondition(_) => "precondition_failed",
            Self::InvalidInput(_) => "invalid_input",
            Self::Storage(_) => "storage_unavailable",
            Self::Collaborator(_) => "collaborator_unavailable",
        }
    }

    /// HTTP-like status for outer layers
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Forbidden { .. } => 403,
            Self::InvalidState { .. } => 423,
            Self::InvalidTransition(_) => 422,
            Self::Conflict(_) => 409,
            Self::Precondition(_) => 412,
            Self::InvalidInput(_) => 400,
            Self::Storage(_) => 503,
            Self::Collaborator(_) => 502,
        }
    }

    /// The caller may retry the same request unchanged
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Collaborator(_))
    }

    /// Caused by the request rather than the system
    #[inline]
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<StoreError> for LifecycleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => Self::Conflict("concurrent modification".to_string()),
            StoreError::Missing(_) => Self::Conflict("record changed concurrently".to_string()),
            other => Self::Storage(other),
        }
    }
}

impl From<ContentError> for LifecycleError {
    fn from(err: ContentError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Result alias used throughout the engine
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_distinct_status() {
        let errors = [
            LifecycleError::NotFound(EntityKind::Proposal),
            LifecycleError::forbidden("submit"),
            LifecycleError::invalid_state("edit", ProposalStatus::Submitted),
            LifecycleError::InvalidTransition(TransitionError {
                from: ProposalStatus::Draft,
                to: ProposalStatus::Approved,
            }),
            LifecycleError::Conflict("dup".into()),
            LifecycleError::Precondition("team".into()),
            LifecycleError::InvalidInput("title".into()),
            LifecycleError::Storage(StoreError::storage("commit", "io")),
            LifecycleError::Collaborator(CollaboratorError::unavailable("teams", "down")),
        ];
        let mut statuses: Vec<u16> = errors.iter().map(LifecycleError::status_code).collect();
        statuses.sort_unstable();
        statuses.dedup();
        assert_eq!(statuses.len(), errors.len());
    }

    #[test]
    fn store_conflicts_hide_driver_details() {
        let err: LifecycleError =
            StoreError::Conflict("UNIQUE constraint failed: proposals.team_id".into()).into();
        assert_eq!(err.code(), "conflict");
        assert!(!err.to_string().contains("proposals.team_id"));
    }

    #[test]
    fn storage_failures_are_retryable_server_errors() {
        let err: LifecycleError = StoreError::storage("commit", "disk I/O error").into();
        assert!(err.is_retryable());
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "storage unavailable");
    }

    #[test]
    fn forbidden_message_names_only_the_action() {
        let err = LifecycleError::forbidden("record a decision");
        assert_eq!(err.to_string(), "not permitted to record a decision");
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }
}
