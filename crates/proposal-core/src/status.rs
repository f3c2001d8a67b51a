//! Proposal lifecycle status

use crate::error::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Being written; version 1 may still be overwritten in place
    Draft,
    /// Handed to the reviewer, content locked
    Submitted,
    /// Reviewer has picked it up
    UnderReview,
    /// Reviewer asked for changes; edits append new versions
    RevisionRequired,
    /// Terminal: approved, derived project exists
    Approved,
    /// Terminal: rejected
    Rejected,
}

impl ProposalStatus {
    /// Every status, in lifecycle order
    pub const ALL: [ProposalStatus; 6] = [
        ProposalStatus::Draft,
        ProposalStatus::Submitted,
        ProposalStatus::UnderReview,
        ProposalStatus::RevisionRequired,
        ProposalStatus::Approved,
        ProposalStatus::Rejected,
    ];

    /// Stable storage representation
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Submitted => "submitted",
            ProposalStatus::UnderReview => "under_review",
            ProposalStatus::RevisionRequired => "revision_required",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
        }
    }

    /// No transition leaves this status
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, ProposalStatus::Approved | ProposalStatus::Rejected)
    }

    /// Counts against the one-active-proposal-per-team rule
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Content may change in this status
    #[inline]
    #[must_use]
    pub const fn accepts_edits(self) -> bool {
        matches!(
            self,
            ProposalStatus::Draft | ProposalStatus::RevisionRequired
        )
    }

    /// Submission may start from this status
    #[inline]
    #[must_use]
    pub const fn accepts_submission(self) -> bool {
        matches!(
            self,
            ProposalStatus::Draft | ProposalStatus::RevisionRequired
        )
    }

    /// A reviewer may record a decision in this status
    #[inline]
    #[must_use]
    pub const fn accepts_review(self) -> bool {
        matches!(
            self,
            ProposalStatus::Submitted | ProposalStatus::UnderReview
        )
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProposalStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("proposal status", s))
    }
}
