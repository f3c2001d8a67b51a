//! Decision Processor
//!
//! A verdict is handled in two transactions:
//! 1. validate everything and persist the [`Decision`] row (durable on its own)
//! 2. apply the verdict: status transition, and for `approve` the version
//!    flag and the derived project, all or nothing
//!
//! Before either, a read-only pass runs the same validation, and only then
//! is the team directory asked for the project's department context, since
//! collaborators are async and transaction closures are not. The apply step
//! re-checks that the proposal is live and still assigned to the deciding
//! reviewer, so a reassignment or archive committed in between wins.

use chrono::Utc;
use proposal_core::{
    state_machine, Decision, DecisionId, DecisionKind, DepartmentId, DerivedRecord, Proposal,
    ProposalId, ProposalStatus, TeamId, UserId, VersionId, Visibility,
};
use proposal_store::{Datastore, StoreError, StoreTx};
use std::sync::Arc;
use tracing::{debug, info};

use crate::collaborators::TeamDirectory;
use crate::config::EngineConfig;
use crate::error::{EntityKind, LifecycleError, LifecycleResult};
use crate::version_store::VersionStore;

/// A reviewer's verdict as submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionRequest {
    /// Proposal under review
    pub proposal_id: ProposalId,
    /// Version the verdict applies to
    pub version_id: VersionId,
    /// Who decides
    pub reviewer_id: UserId,
    /// Verdict
    pub kind: DecisionKind,
    /// Required reasoning
    pub justification: String,
}

/// Everything a committed verdict produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    /// The persisted decision
    pub decision: Decision,
    /// Status before the verdict
    pub previous_status: ProposalStatus,
    /// Proposal after the verdict
    pub proposal: Proposal,
    /// Derived project, for approvals
    pub project: Option<DerivedRecord>,
}

/// Applies reviewer verdicts
pub struct DecisionProcessor<S> {
    store: Arc<S>,
    teams: Arc<dyn TeamDirectory>,
    config: Arc<EngineConfig>,
}

impl<S> Clone for DecisionProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            teams: Arc::clone(&self.teams),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: Datastore> DecisionProcessor<S> {
    /// Create processor
    #[must_use]
    pub fn new(store: Arc<S>, teams: Arc<dyn TeamDirectory>, config: Arc<EngineConfig>) -> Self {
        Self {
            store,
            teams,
            config,
        }
    }

    /// Record a verdict and apply it
    ///
    /// # Errors
    /// - `NotFound` for an unknown proposal or a version of another proposal
    /// - `Forbidden` unless the caller is the assigned reviewer
    /// - `InvalidState` unless the proposal is `submitted` or `under_review`
    /// - `InvalidInput` for a missing or too short justification
    /// - `Conflict` when the version is not the latest one
    /// - `Precondition` when approving a proposal without a team
    ///
    /// If applying the verdict fails after the decision row committed, the
    /// row stays and the error is returned; the proposal is untouched. This
    /// includes a reassignment (`Forbidden`) or archive (`NotFound`) that
    /// commits between the two transactions.
    pub async fn record_decision(&self, request: DecisionRequest) -> LifecycleResult<DecisionOutcome> {
        let min_chars = self.config.min_justification_chars;
        let check = request.clone();
        let proposal = self
            .store
            .transact(move |tx| validate(tx, &check, min_chars))
            .await?;
        let department_id = match (request.kind, proposal.team_id) {
            (DecisionKind::Approve, Some(team_id)) => self.department_of(team_id).await?,
            _ => None,
        };

        let decision = self
            .store
            .transact(move |tx| {
                let proposal = validate(tx, &request, min_chars)?;
                let decision = Decision {
                    id: DecisionId::new(),
                    proposal_id: proposal.id,
                    version_id: request.version_id,
                    reviewer_id: request.reviewer_id,
                    kind: request.kind,
                    justification: request.justification.trim().to_string(),
                    created_at: Utc::now(),
                };
                tx.insert_decision(&decision)?;
                Ok::<_, LifecycleError>(decision)
            })
            .await?;
        debug!(decision = %decision.id, kind = %decision.kind, "decision persisted");

        let visibility = self.config.default_project_visibility;
        let applied = decision.clone();
        let (previous_status, proposal, project) = self
            .store
            .transact(move |tx| apply(tx, &applied, department_id, visibility))
            .await?;

        info!(
            proposal = %proposal.id,
            from = %previous_status,
            to = %proposal.status,
            "verdict applied"
        );
        Ok(DecisionOutcome {
            decision,
            previous_status,
            proposal,
            project,
        })
    }

    /// Department context copied into the derived project
    async fn department_of(&self, team_id: TeamId) -> LifecycleResult<Option<DepartmentId>> {
        Ok(self
            .teams
            .get_team(team_id)
            .await?
            .and_then(|team| team.department_id))
    }
}

/// Checks run before any write, re-run inside the transaction that writes
fn validate(
    tx: &mut dyn StoreTx,
    request: &DecisionRequest,
    min_chars: usize,
) -> LifecycleResult<Proposal> {
    let proposal = tx
        .proposal(request.proposal_id)?
        .filter(|p| !p.is_archived())
        .ok_or(LifecycleError::NotFound(EntityKind::Proposal))?;

    if proposal.reviewer_id != Some(request.reviewer_id) {
        return Err(LifecycleError::forbidden("record a decision"));
    }
    if !proposal.status.accepts_review() {
        return Err(LifecycleError::invalid_state("record a decision", proposal.status));
    }

    let justification = request.justification.trim();
    if justification.is_empty() {
        return Err(LifecycleError::InvalidInput("justification is required".into()));
    }
    if justification.chars().count() < min_chars {
        return Err(LifecycleError::InvalidInput(format!(
            "justification must be at least {min_chars} characters"
        )));
    }

    let version = tx
        .version(request.version_id)?
        .filter(|v| v.proposal_id == proposal.id)
        .ok_or(LifecycleError::NotFound(EntityKind::Version))?;
    let latest = tx.latest_version_number(proposal.id)?.unwrap_or(0);
    if version.version_number != latest {
        return Err(LifecycleError::Conflict(format!(
            "version {} is not the latest version",
            version.version_number
        )));
    }

    if request.kind == DecisionKind::Approve && proposal.team_id.is_none() {
        return Err(LifecycleError::Precondition(
            "a proposal without a team cannot be approved".into(),
        ));
    }
    Ok(proposal)
}

/// The atomic unit of a verdict
fn apply(
    tx: &mut dyn StoreTx,
    decision: &Decision,
    department_id: Option<DepartmentId>,
    visibility: Visibility,
) -> LifecycleResult<(ProposalStatus, Proposal, Option<DerivedRecord>)> {
    let mut proposal = tx
        .proposal(decision.proposal_id)?
        .filter(|p| !p.is_archived())
        .ok_or(LifecycleError::NotFound(EntityKind::Proposal))?;
    if proposal.reviewer_id != Some(decision.reviewer_id) {
        return Err(LifecycleError::forbidden("record a decision"));
    }
    let previous_status = proposal.status;
    if !previous_status.accepts_review() {
        return Err(LifecycleError::invalid_state("apply a decision", previous_status));
    }

    let now = Utc::now();
    if proposal.status == ProposalStatus::Submitted {
        state_machine::transition(&mut proposal, ProposalStatus::UnderReview, now)?;
    }

    let project = match decision.kind {
        DecisionKind::Approve => {
            let team_id = proposal.team_id.ok_or_else(|| {
                LifecycleError::Precondition("a proposal without a team cannot be approved".into())
            })?;
            let version = VersionStore::new(&mut *tx).mark_approved(decision.version_id)?;
            state_machine::transition(&mut proposal, ProposalStatus::Approved, now)?;
            let record = DerivedRecord::from_approved_version(
                &version,
                team_id,
                department_id,
                decision.reviewer_id,
                visibility,
                now,
            );
            tx.insert_project(&record).map_err(|e| match e {
                StoreError::Conflict(_) => {
                    LifecycleError::Conflict("proposal already has a derived project".into())
                }
                other => other.into(),
            })?;
            Some(record)
        }
        DecisionKind::Revise | DecisionKind::Reject => {
            state_machine::transition(&mut proposal, decision.kind.target_status(), now)?;
            None
        }
    };

    tx.update_proposal(&proposal)?;
    Ok((previous_status, proposal, project))
}
