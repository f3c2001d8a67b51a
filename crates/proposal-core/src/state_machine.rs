//! Proposal status transition table
//!
//! The table is a closed `match` over [`ProposalStatus`], so adding a status
//! forces every arm to be revisited. Re-submission after a revision request
//! goes straight from `revision_required` to `submitted`; there is no path
//! back to `draft`.

use crate::error::TransitionError;
use crate::model::Proposal;
use crate::status::ProposalStatus;
use chrono::{DateTime, Utc};

/// Statuses reachable in one step from `from`
#[must_use]
pub fn allowed_transitions(from: ProposalStatus) -> &'static [ProposalStatus] {
    use ProposalStatus::*;
    match from {
        Draft => &[Submitted],
        Submitted => &[UnderReview],
        UnderReview => &[RevisionRequired, Approved, Rejected],
        RevisionRequired => &[Submitted],
        Approved | Rejected => &[],
    }
}

/// Pure lookup against the transition table
#[inline]
#[must_use]
pub fn can_transition(from: ProposalStatus, to: ProposalStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Validate a transition without applying it
///
/// # Errors
/// `TransitionError` when `(from, to)` is not in the table
pub fn validate_transition(from: ProposalStatus, to: ProposalStatus) -> Result<(), TransitionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

/// Move `proposal` to `to`, stamping `updated_at`
///
/// The caller persists the proposal inside the same datastore transaction as
/// whatever side effect accompanies the transition.
///
/// # Returns
/// The previous status
///
/// # Errors
/// `TransitionError` when the move is not in the table; the proposal is left
/// untouched.
pub fn transition(
    proposal: &mut Proposal,
    to: ProposalStatus,
    at: DateTime<Utc>,
) -> Result<ProposalStatus, TransitionError> {
    let from = proposal.status;
    validate_transition(from, to)?;
    proposal.status = to;
    proposal.updated_at = at;
    if from == ProposalStatus::Draft && proposal.first_submitted_at.is_none() {
        proposal.first_submitted_at = Some(at);
    }
    Ok(from)
}
