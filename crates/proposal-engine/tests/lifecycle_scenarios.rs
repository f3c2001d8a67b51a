//! End-to-end lifecycle behaviour through the service façade

use pretty_assertions::assert_eq;
use proposal_core::{DecisionKind, ProposalFilter, ProposalStatus, Visibility};
use proposal_engine::{EngineConfig, EntityKind, LifecycleError};
use proposal_store::{Datastore, InMemoryStore};
use proposal_test_utils::*;

async fn draft_revise_approve<S: Datastore>(h: Harness<S>) {
    let (pid, v1) = h.draft_with_reviewer().await;

    let err = h.service.submit(pid, &leader(), TEAM).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Precondition(_)), "{err}");

    h.finalize_team();
    let submitted = h.service.submit(pid, &leader(), TEAM).await.unwrap();
    assert_eq!(submitted.status, ProposalStatus::Submitted);
    assert!(submitted.first_submitted_at.is_some());

    h.service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Revise, JUSTIFICATION)
        .await
        .unwrap();
    let view = h.service.get_proposal(pid, &leader()).await.unwrap();
    assert_eq!(view.proposal.status, ProposalStatus::RevisionRequired);

    let v2 = h
        .service
        .update_content(pid, &leader(), revised_content(2))
        .await
        .unwrap();
    assert_eq!(v2.version_number, 2);
    let view = h.service.get_proposal(pid, &leader()).await.unwrap();
    assert_eq!(view.proposal.status, ProposalStatus::RevisionRequired);
    assert_eq!(view.latest_version.map(|v| v.id), Some(v2.id));

    let resubmitted = h.service.submit(pid, &leader(), TEAM).await.unwrap();
    assert_eq!(resubmitted.status, ProposalStatus::Submitted);

    h.service
        .record_decision(&reviewer(), pid, v2.id, DecisionKind::Approve, JUSTIFICATION)
        .await
        .unwrap();

    let view = h.service.get_proposal(pid, &leader()).await.unwrap();
    assert_eq!(view.proposal.status, ProposalStatus::Approved);

    let versions = h.service.list_versions(pid, &leader()).await.unwrap();
    let summary: Vec<(u32, bool, bool)> = versions
        .iter()
        .map(|v| (v.version_number, v.is_approved, v.is_locked()))
        .collect();
    assert_eq!(summary, vec![(2, true, true), (1, false, true)]);

    let project = h.service.get_project(pid, &leader()).await.unwrap();
    assert_eq!(project.proposal_id, pid);
    assert_eq!(project.approved_version_id, v2.id);
    assert_eq!(project.team_id, TEAM);
    assert_eq!(project.department_id, Some(DEPARTMENT));
    assert_eq!(project.approved_by, REVIEWER);
    assert_eq!(project.visibility, Visibility::Restricted);
    assert_eq!(project.title, sample_content().title);

    let kinds: Vec<DecisionKind> = h
        .service
        .list_decisions(pid, &leader())
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.kind)
        .collect();
    assert_eq!(kinds, vec![DecisionKind::Revise, DecisionKind::Approve]);

    let actions = h.audit.actions();
    for expected in [
        "proposal.created",
        "proposal.reviewer_assigned",
        "proposal.submitted",
        "decision.recorded",
        "version.appended",
        "project.created",
    ] {
        assert!(actions.iter().any(|a| a == expected), "missing {expected}");
    }
}

#[tokio::test]
async fn draft_revise_approve_in_memory() {
    draft_revise_approve(in_memory_harness()).await;
}

#[tokio::test]
async fn draft_revise_approve_sqlite() {
    draft_revise_approve(sqlite_harness()).await;
}

#[tokio::test]
async fn second_draft_for_team_conflicts() {
    let h = sqlite_harness();
    h.service
        .create_draft(&leader(), TEAM, sample_content())
        .await
        .unwrap();

    let err = h
        .service
        .create_draft(&leader(), TEAM, sample_content())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Conflict(_)));
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn rejected_proposal_frees_the_team() {
    let h = in_memory_harness();
    let (pid, v1) = h.submitted_proposal().await;
    h.service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Reject, JUSTIFICATION)
        .await
        .unwrap();

    let (next, _) = h
        .service
        .create_draft(&leader(), TEAM, sample_content())
        .await
        .unwrap();
    assert_ne!(next.id, pid);
}

#[tokio::test]
async fn archived_proposal_frees_the_team_and_rejects_edits() {
    let h = sqlite_harness();
    let (pid, v1) = h.submitted_proposal().await;
    h.service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Revise, JUSTIFICATION)
        .await
        .unwrap();

    let err = h.service.archive(pid, &leader()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));

    let archived = h.service.archive(pid, &admin()).await.unwrap();
    assert!(archived.is_archived());
    let again = h.service.archive(pid, &admin()).await.unwrap();
    assert_eq!(again.archived_at, archived.archived_at);

    let err = h
        .service
        .update_content(pid, &leader(), revised_content(2))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(EntityKind::Proposal)));

    h.service
        .create_draft(&leader(), TEAM, sample_content())
        .await
        .unwrap();

    let visible = h
        .service
        .list_proposals(&admin(), ProposalFilter::new())
        .await
        .unwrap();
    let everything = h
        .service
        .list_proposals(&admin(), ProposalFilter::new().including_archived())
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn drafts_cannot_be_archived_but_can_be_deleted() {
    let h = in_memory_harness();
    let (pid, _) = h.draft_with_reviewer().await;

    let err = h.service.archive(pid, &admin()).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidState {
            status: ProposalStatus::Draft,
            ..
        }
    ));

    let err = h.service.delete_draft(pid, &member()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));

    h.service.delete_draft(pid, &leader()).await.unwrap();
    let err = h.service.list_versions(pid, &admin()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(EntityKind::Proposal)));
}

#[tokio::test]
async fn submitted_proposal_cannot_be_deleted() {
    let h = in_memory_harness();
    let (pid, _) = h.submitted_proposal().await;
    let err = h.service.delete_draft(pid, &leader()).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidState {
            status: ProposalStatus::Submitted,
            ..
        }
    ));
}

// =============================================================================
// Immutability
// =============================================================================

#[tokio::test]
async fn draft_edits_overwrite_version_one() {
    let h = in_memory_harness();
    let (pid, v1) = h.draft_with_reviewer().await;

    let edited = h
        .service
        .update_content(pid, &leader(), revised_content(1))
        .await
        .unwrap();
    assert_eq!(edited.id, v1);
    assert_eq!(edited.version_number, 1);
    assert_eq!(h.service.list_versions(pid, &leader()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn content_is_frozen_once_submitted() {
    let h = sqlite_harness();
    let (pid, v1) = h.submitted_proposal().await;

    let err = h
        .service
        .update_content(pid, &leader(), revised_content(9))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidState {
            status: ProposalStatus::Submitted,
            ..
        }
    ));

    h.service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Revise, JUSTIFICATION)
        .await
        .unwrap();
    h.service
        .update_content(pid, &leader(), revised_content(2))
        .await
        .unwrap();

    let versions = h.service.list_versions(pid, &leader()).await.unwrap();
    let original = versions.iter().find(|v| v.id == v1).unwrap();
    assert_eq!(original.content, sample_content());
    assert!(original.is_locked());
}

#[tokio::test]
async fn resubmission_requires_a_new_version() {
    let h = in_memory_harness();
    let (pid, v1) = h.submitted_proposal().await;
    h.service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Revise, JUSTIFICATION)
        .await
        .unwrap();

    let err = h.service.submit(pid, &leader(), TEAM).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Precondition(_)));
    assert_eq!(err.status_code(), 412);
}

#[tokio::test]
async fn resubmission_rule_can_be_relaxed() {
    let h = Harness::with_config(
        InMemoryStore::new(),
        EngineConfig::default().with_new_version_required_for_resubmission(false),
    );
    let (pid, v1) = h.submitted_proposal().await;
    h.service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Revise, JUSTIFICATION)
        .await
        .unwrap();

    let resubmitted = h.service.submit(pid, &leader(), TEAM).await.unwrap();
    assert_eq!(resubmitted.status, ProposalStatus::Submitted);
}

// =============================================================================
// Review
// =============================================================================

#[tokio::test]
async fn verdict_on_stale_version_conflicts() {
    let h = in_memory_harness();
    let (pid, v1) = h.submitted_proposal().await;
    h.service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Revise, JUSTIFICATION)
        .await
        .unwrap();
    h.service
        .update_content(pid, &leader(), revised_content(2))
        .await
        .unwrap();
    h.service.submit(pid, &leader(), TEAM).await.unwrap();

    let err = h
        .service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Approve, JUSTIFICATION)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Conflict(_)));
}

#[tokio::test]
async fn start_review_is_reserved_for_the_assigned_reviewer() {
    let h = in_memory_harness();
    let (pid, _) = h.submitted_proposal().await;

    let err = h.service.start_review(pid, &other_reviewer()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));

    let under_review = h.service.start_review(pid, &reviewer()).await.unwrap();
    assert_eq!(under_review.status, ProposalStatus::UnderReview);

    let err = h.service.start_review(pid, &reviewer()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidTransition(_)));
    assert_eq!(err.status_code(), 422);
}

#[tokio::test]
async fn reviewer_is_fixed_once_review_starts() {
    let h = in_memory_harness();
    let (pid, _) = h.submitted_proposal().await;
    h.service
        .assign_reviewer(pid, &department_head(), OTHER_REVIEWER)
        .await
        .unwrap();
    h.service.start_review(pid, &other_reviewer()).await.unwrap();

    let err = h
        .service
        .assign_reviewer(pid, &admin(), REVIEWER)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::InvalidState {
            status: ProposalStatus::UnderReview,
            ..
        }
    ));
}

#[tokio::test]
async fn replaced_reviewer_can_no_longer_decide() {
    let h = sqlite_harness();
    let (pid, v1) = h.submitted_proposal().await;
    h.service
        .assign_reviewer(pid, &department_head(), OTHER_REVIEWER)
        .await
        .unwrap();

    let err = h
        .service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Approve, JUSTIFICATION)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }), "{err}");
    assert!(h.service.list_decisions(pid, &admin()).await.unwrap().is_empty());

    h.service
        .record_decision(&other_reviewer(), pid, v1, DecisionKind::Reject, JUSTIFICATION)
        .await
        .unwrap();
}

#[tokio::test]
async fn terminal_proposals_accept_nothing() {
    let h = sqlite_harness();
    let (pid, v1) = h.submitted_proposal().await;
    h.service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Approve, JUSTIFICATION)
        .await
        .unwrap();

    let submit = h.service.submit(pid, &leader(), TEAM).await.unwrap_err();
    let edit = h
        .service
        .update_content(pid, &leader(), revised_content(2))
        .await
        .unwrap_err();
    let decide = h
        .service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Reject, JUSTIFICATION)
        .await
        .unwrap_err();
    for err in [submit, edit, decide] {
        assert!(
            matches!(
                err,
                LifecycleError::InvalidState {
                    status: ProposalStatus::Approved,
                    ..
                }
            ),
            "{err}"
        );
    }
}

// =============================================================================
// Authorization
// =============================================================================

#[tokio::test]
async fn only_the_team_leader_authors() {
    let h = in_memory_harness();

    let err = h
        .service
        .create_draft(&member(), TEAM, sample_content())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));

    let err = h
        .service
        .create_draft(&leader(), proposal_core::TeamId(99), sample_content())
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(EntityKind::Team)));

    let (pid, _) = h.draft_with_reviewer().await;
    h.finalize_team();
    let err = h.service.submit(pid, &member(), TEAM).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));

    let err = h
        .service
        .submit(pid, &other_leader(), OTHER_TEAM)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));

    let err = h
        .service
        .update_content(pid, &member(), revised_content(1))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));
}

#[tokio::test]
async fn only_the_assigned_reviewer_decides() {
    let h = in_memory_harness();
    let (pid, v1) = h.submitted_proposal().await;

    let err = h
        .service
        .record_decision(&other_reviewer(), pid, v1, DecisionKind::Approve, JUSTIFICATION)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));
    assert!(h.service.list_decisions(pid, &admin()).await.unwrap().is_empty());
}

#[tokio::test]
async fn reviewer_assignment_needs_admin_or_department_head() {
    let h = in_memory_harness();
    let (proposal, _) = h
        .service
        .create_draft(&leader(), TEAM, sample_content())
        .await
        .unwrap();

    for actor in [leader(), reviewer(), foreign_department_head()] {
        let err = h
            .service
            .assign_reviewer(proposal.id, &actor, REVIEWER)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden { .. }));
    }

    let assigned = h
        .service
        .assign_reviewer(proposal.id, &department_head(), REVIEWER)
        .await
        .unwrap();
    assert_eq!(assigned.reviewer_id, Some(REVIEWER));
    assert!(h
        .notifier
        .sent()
        .iter()
        .any(|n| n.recipients == vec![REVIEWER]));
}

#[tokio::test]
async fn read_access_follows_relationships() {
    let h = in_memory_harness();
    let (pid, _) = h.draft_with_reviewer().await;

    for actor in [admin(), leader(), member(), reviewer(), department_head()] {
        h.service.get_proposal(pid, &actor).await.unwrap();
    }
    for actor in [outsider(), other_reviewer(), foreign_department_head()] {
        let err = h.service.get_proposal(pid, &actor).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Forbidden { .. }));
        assert_eq!(err.to_string(), "not permitted to view this proposal");
    }

    let mine = h
        .service
        .list_proposals(&member(), ProposalFilter::new())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    let theirs = h
        .service
        .list_proposals(&outsider(), ProposalFilter::new())
        .await
        .unwrap();
    assert!(theirs.is_empty());
}

#[tokio::test]
async fn public_projects_are_visible_to_everyone() {
    let h = in_memory_harness();
    let (pid, v1) = h.submitted_proposal().await;
    h.service
        .record_decision(&reviewer(), pid, v1, DecisionKind::Approve, JUSTIFICATION)
        .await
        .unwrap();

    let err = h.service.get_project(pid, &outsider()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));

    let err = h
        .service
        .set_project_visibility(pid, &leader(), Visibility::Public)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));

    let project = h
        .service
        .set_project_visibility(pid, &reviewer(), Visibility::Public)
        .await
        .unwrap();
    assert_eq!(project.visibility, Visibility::Public);
    assert_eq!(
        h.service.get_project(pid, &outsider()).await.unwrap().id,
        project.id
    );
}

#[tokio::test]
async fn project_lookup_before_approval_is_not_found() {
    let h = in_memory_harness();
    let (pid, _) = h.submitted_proposal().await;
    let err = h.service.get_project(pid, &admin()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound(EntityKind::Project)));
}

// =============================================================================
// Content and attachments
// =============================================================================

#[tokio::test]
async fn invalid_content_is_rejected_before_any_write() {
    let h = in_memory_harness();
    let err = h
        .service
        .create_draft(&leader(), TEAM, proposal_core::ProposalContent::new("  ", "problem"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidInput(_)));
    assert_eq!(err.status_code(), 400);
    assert!(h
        .service
        .list_proposals(&admin(), ProposalFilter::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn attachments_roundtrip_through_sqlite() {
    let h = sqlite_harness();
    let descriptor = h
        .service
        .store_attachment(&leader(), "plan.pdf", b"%PDF-1.7 plan")
        .await
        .unwrap();
    assert_eq!(h.files.get(&descriptor.url).unwrap(), b"%PDF-1.7 plan".to_vec());

    let content = sample_content().with_attachment(descriptor.clone());
    let (proposal, _) = h
        .service
        .create_draft(&leader(), TEAM, content)
        .await
        .unwrap();
    let view = h.service.get_proposal(proposal.id, &leader()).await.unwrap();
    assert_eq!(view.latest_version.unwrap().content.attachment, Some(descriptor));
}

#[tokio::test]
async fn oversized_attachment_is_rejected() {
    let h = Harness::with_config(
        InMemoryStore::new(),
        EngineConfig::default().with_max_attachment_bytes(8),
    );
    let err = h
        .service
        .store_attachment(&leader(), "big.bin", &[0u8; 9])
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidInput(_)));
    assert!(h.files.is_empty());
}
