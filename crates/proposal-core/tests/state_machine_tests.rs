use chrono::Utc;
use proposal_core::state_machine::{
    allowed_transitions, can_transition, transition, validate_transition,
};
use proposal_core::{Proposal, ProposalStatus, TeamId, UserId};
use proptest::prelude::*;

const TABLE: &[(ProposalStatus, ProposalStatus)] = &[
    (ProposalStatus::Draft, ProposalStatus::Submitted),
    (ProposalStatus::Submitted, ProposalStatus::UnderReview),
    (ProposalStatus::UnderReview, ProposalStatus::RevisionRequired),
    (ProposalStatus::UnderReview, ProposalStatus::Approved),
    (ProposalStatus::UnderReview, ProposalStatus::Rejected),
    (ProposalStatus::RevisionRequired, ProposalStatus::Submitted),
];

fn any_status() -> impl Strategy<Value = ProposalStatus> {
    prop_oneof![
        Just(ProposalStatus::Draft),
        Just(ProposalStatus::Submitted),
        Just(ProposalStatus::UnderReview),
        Just(ProposalStatus::RevisionRequired),
        Just(ProposalStatus::Approved),
        Just(ProposalStatus::Rejected),
    ]
}

fn proposal_in(status: ProposalStatus) -> Proposal {
    let mut proposal = Proposal::new_draft(Some(TeamId(7)), UserId(1), Utc::now());
    proposal.status = status;
    proposal
}

#[test]
fn test_draft_transitions() {
    assert!(validate_transition(ProposalStatus::Draft, ProposalStatus::Submitted).is_ok());

    assert!(validate_transition(ProposalStatus::Draft, ProposalStatus::UnderReview).is_err());
    assert!(validate_transition(ProposalStatus::Draft, ProposalStatus::Approved).is_err());
}

#[test]
fn test_under_review_transitions() {
    for to in [
        ProposalStatus::RevisionRequired,
        ProposalStatus::Approved,
        ProposalStatus::Rejected,
    ] {
        assert!(can_transition(ProposalStatus::UnderReview, to));
    }
    assert!(!can_transition(
        ProposalStatus::UnderReview,
        ProposalStatus::Draft
    ));
}

#[test]
fn test_table_has_exactly_the_documented_edges() {
    let edges: usize = ProposalStatus::ALL
        .iter()
        .map(|from| allowed_transitions(*from).len())
        .sum();
    assert_eq!(edges, TABLE.len());
}

proptest! {
    #[test]
    fn prop_transition_agrees_with_table(from in any_status(), to in any_status()) {
        let mut proposal = proposal_in(from);
        let result = transition(&mut proposal, to, Utc::now());

        if TABLE.contains(&(from, to)) {
            prop_assert_eq!(result, Ok(from));
            prop_assert_eq!(proposal.status, to);
        } else {
            let err = result.unwrap_err();
            prop_assert_eq!(err.from, from);
            prop_assert_eq!(err.to, to);
            prop_assert_eq!(proposal.status, from);
        }
    }

    #[test]
    fn prop_terminal_statuses_are_sinks(from in any_status(), to in any_status()) {
        if from.is_terminal() {
            prop_assert!(!can_transition(from, to));
        }
    }
}
