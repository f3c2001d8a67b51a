//! Lifecycle Service
//!
//! Façade over the Version Store, the state machine and the Decision
//! Processor. Each operation:
//! 1. validates input and authorizes the actor (collaborator lookups happen
//!    here, outside any transaction)
//! 2. re-reads and mutates inside one datastore transaction
//! 3. after commit, records audit entries and sends notifications on a
//!    best-effort basis
//!
//! Ownership of a proposal (its team, its creator) never changes after
//! creation, so authorizing against a pre-read is safe; status is always
//! re-checked inside the writing transaction.

use chrono::Utc;
use proposal_core::{
    state_machine, Decision, DecisionKind, DerivedRecord, FileDescriptor, Proposal,
    ProposalContent, ProposalFilter, ProposalId, ProposalStatus, ProposalVersion, TeamId, UserId,
    VersionId, Visibility,
};
use proposal_store::{Datastore, StoreError, StoreTx};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::collaborators::{
    Actor, AdvisoryReport, AuditEntry, Collaborators, Notification, NotificationEvent, TeamInfo,
};
use crate::config::EngineConfig;
use crate::decision::{DecisionProcessor, DecisionRequest};
use crate::error::{EntityKind, LifecycleError, LifecycleResult};
use crate::version_store::VersionStore;

const ACTIVE_PROPOSAL_EXISTS: &str = "team already has an active proposal";

/// Proposal with its current content
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalView {
    /// The proposal
    pub proposal: Proposal,
    /// Highest-numbered version
    pub latest_version: Option<ProposalVersion>,
    /// Advisory feedback on the latest version, when available in time
    pub advisory: Option<AdvisoryReport>,
}

/// The engine's public entry point
pub struct LifecycleService<S> {
    store: Arc<S>,
    collaborators: Collaborators,
    config: Arc<EngineConfig>,
    decisions: DecisionProcessor<S>,
}

impl<S> Clone for LifecycleService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collaborators: self.collaborators.clone(),
            config: Arc::clone(&self.config),
            decisions: self.decisions.clone(),
        }
    }
}

impl<S: Datastore> LifecycleService<S> {
    /// Create service
    #[must_use]
    pub fn new(store: Arc<S>, collaborators: Collaborators, config: EngineConfig) -> Self {
        let config = Arc::new(config);
        let decisions = DecisionProcessor::new(
            Arc::clone(&store),
            Arc::clone(&collaborators.teams),
            Arc::clone(&config),
        );
        Self {
            store,
            collaborators,
            config,
            decisions,
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Authoring
    // =========================================================================

    /// Create a proposal in `draft` with version 1
    ///
    /// # Errors
    /// - `InvalidInput` for invalid content
    /// - `NotFound` for an unknown team
    /// - `Forbidden` unless the actor leads the team
    /// - `Conflict` if the team already has an active proposal
    #[instrument(skip_all, fields(team = %team_id, actor = %actor.user_id))]
    pub async fn create_draft(
        &self,
        actor: &Actor,
        team_id: TeamId,
        content: ProposalContent,
    ) -> LifecycleResult<(Proposal, ProposalVersion)> {
        content.validate(&self.config.content_limits)?;
        let team = self.team(team_id).await?;
        if team.leader_id != actor.user_id {
            return Err(LifecycleError::forbidden("create a draft for this team"));
        }

        let author = actor.user_id;
        let (proposal, version) = self
            .store
            .transact(move |tx| {
                if tx.active_proposal_for_team(team_id)?.is_some() {
                    return Err(LifecycleError::Conflict(ACTIVE_PROPOSAL_EXISTS.into()));
                }
                let now = Utc::now();
                let proposal = Proposal::new_draft(Some(team_id), author, now);
                tx.insert_proposal(&proposal)
                    .map_err(|e| conflict_as(e, ACTIVE_PROPOSAL_EXISTS))?;
                let version = VersionStore::new(&mut *tx)
                    .create_initial_version(proposal.id, content, author, now)?;
                Ok((proposal, version))
            })
            .await?;

        info!(proposal = %proposal.id, "draft created");
        self.audit(AuditEntry {
            new_state: Some(proposal.status.to_string()),
            ..AuditEntry::new("proposal", proposal.id, "proposal.created", author)
                .with_context(json!({ "team_id": team_id.0 }))
        })
        .await;
        Ok((proposal, version))
    }

    /// Change the proposal's content
    ///
    /// In `draft` version 1 is overwritten in place; in `revision_required`
    /// a new version is appended and the status stays put.
    ///
    /// # Errors
    /// - `InvalidInput` for invalid content
    /// - `NotFound` for an unknown or archived proposal
    /// - `Forbidden` unless the actor leads the owning team
    /// - `InvalidState` in any other status
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id))]
    pub async fn update_content(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
        content: ProposalContent,
    ) -> LifecycleResult<ProposalVersion> {
        content.validate(&self.config.content_limits)?;
        let proposal = self.load(proposal_id).await?;
        self.authorize_author(actor, &proposal, "edit this proposal").await?;

        let author = actor.user_id;
        let (version, appended) = self
            .store
            .transact(move |tx| {
                let mut proposal = live(tx, proposal_id)?;
                let now = Utc::now();
                let outcome = match proposal.status {
                    ProposalStatus::Draft => (
                        VersionStore::new(&mut *tx).overwrite_draft_version(proposal_id, content)?,
                        false,
                    ),
                    ProposalStatus::RevisionRequired => (
                        VersionStore::new(&mut *tx)
                            .append_new_version(proposal_id, content, author, now)?,
                        true,
                    ),
                    status => return Err(LifecycleError::invalid_state("edit content", status)),
                };
                proposal.updated_at = now;
                tx.update_proposal(&proposal)?;
                Ok(outcome)
            })
            .await?;

        let action = if appended {
            "version.appended"
        } else {
            "version.overwritten"
        };
        info!(version = version.version_number, action, "content updated");
        self.audit(
            AuditEntry::new("version", version.id, action, author)
                .with_context(json!({ "version_number": version.version_number })),
        )
        .await;
        Ok(version)
    }

    /// Submit for review
    ///
    /// Locks the latest version. From `revision_required` the latest version
    /// must be newer than the one last decided on, unless configured
    /// otherwise.
    ///
    /// # Errors
    /// - `NotFound` for an unknown proposal or team
    /// - `Forbidden` unless the actor leads `team_id` and it owns the proposal
    /// - `Precondition` if the team is not finalized, or no new version exists
    /// - `InvalidState` unless the proposal is `draft` or `revision_required`
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id))]
    pub async fn submit(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
        team_id: TeamId,
    ) -> LifecycleResult<Proposal> {
        let proposal = self.load(proposal_id).await?;
        if proposal.team_id != Some(team_id) {
            return Err(LifecycleError::forbidden("submit this proposal"));
        }
        let team = self.team(team_id).await?;
        if team.leader_id != actor.user_id {
            return Err(LifecycleError::forbidden("submit this proposal"));
        }
        if !team.is_finalized {
            return Err(LifecycleError::Precondition("team roster is not finalized".into()));
        }

        let require_new_version = self.config.require_new_version_for_resubmission;
        let (previous, proposal, version) = self
            .store
            .transact(move |tx| {
                let mut proposal = live(tx, proposal_id)?;
                let previous = proposal.status;
                if !previous.accepts_submission() {
                    return Err(LifecycleError::invalid_state("submit", previous));
                }
                let last_reviewed = tx.decisions(proposal_id)?.last().map(|d| d.version_id);

                let now = Utc::now();
                let mut versions = VersionStore::new(&mut *tx);
                let mut latest = versions.latest_version(proposal_id)?;
                if previous == ProposalStatus::RevisionRequired
                    && require_new_version
                    && last_reviewed == Some(latest.id)
                {
                    return Err(LifecycleError::Precondition(
                        "a new version is required before re-submission".into(),
                    ));
                }
                versions.lock(&mut latest, now)?;

                state_machine::transition(&mut proposal, ProposalStatus::Submitted, now)?;
                tx.update_proposal(&proposal)?;
                Ok((previous, proposal, latest))
            })
            .await?;

        info!(version = version.version_number, "proposal submitted");
        self.audit(
            AuditEntry::new("proposal", proposal.id, "proposal.submitted", actor.user_id)
                .with_states(previous, proposal.status)
                .with_context(json!({ "version_number": version.version_number })),
        )
        .await;
        self.notify(
            proposal.reviewer_id.into_iter().collect(),
            proposal.id,
            NotificationEvent::Submitted,
        )
        .await;
        Ok(proposal)
    }

    /// Record a reviewer's verdict
    ///
    /// # Errors
    /// See [`DecisionProcessor::record_decision`].
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %reviewer.user_id, kind = %kind))]
    pub async fn record_decision(
        &self,
        reviewer: &Actor,
        proposal_id: ProposalId,
        version_id: VersionId,
        kind: DecisionKind,
        justification: impl Into<String>,
    ) -> LifecycleResult<Decision> {
        let outcome = self
            .decisions
            .record_decision(DecisionRequest {
                proposal_id,
                version_id,
                reviewer_id: reviewer.user_id,
                kind,
                justification: justification.into(),
            })
            .await?;

        let reviewer_id = reviewer.user_id;
        self.audit(
            AuditEntry::new("decision", outcome.decision.id, "decision.recorded", reviewer_id)
                .with_context(json!({
                    "proposal_id": proposal_id.to_string(),
                    "version_id": version_id.to_string(),
                    "kind": kind.as_str(),
                })),
        )
        .await;
        self.audit(
            AuditEntry::new("proposal", proposal_id, "proposal.status_changed", reviewer_id)
                .with_states(outcome.previous_status, outcome.proposal.status),
        )
        .await;
        if let Some(project) = &outcome.project {
            self.audit(AuditEntry::new("project", project.id, "project.created", reviewer_id))
                .await;
        }
        self.notify(
            vec![outcome.proposal.created_by],
            proposal_id,
            NotificationEvent::Decided(kind),
        )
        .await;
        Ok(outcome.decision)
    }

    /// Physically delete a proposal that is still a draft
    ///
    /// # Errors
    /// - `NotFound` for an unknown proposal
    /// - `Forbidden` unless the actor leads the owning team
    /// - `InvalidState` once the proposal has left `draft`
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id))]
    pub async fn delete_draft(&self, proposal_id: ProposalId, actor: &Actor) -> LifecycleResult<()> {
        let proposal = self.load(proposal_id).await?;
        self.authorize_author(actor, &proposal, "delete this proposal").await?;

        self.store
            .transact(move |tx| {
                let proposal = live(tx, proposal_id)?;
                if proposal.status != ProposalStatus::Draft {
                    return Err(LifecycleError::invalid_state("delete", proposal.status));
                }
                if !tx.delete_proposal(proposal_id)? {
                    return Err(LifecycleError::NotFound(EntityKind::Proposal));
                }
                Ok(())
            })
            .await?;

        info!("draft deleted");
        self.audit(AuditEntry::new("proposal", proposal_id, "proposal.deleted", actor.user_id))
            .await;
        Ok(())
    }

    // =========================================================================
    // Administration
    // =========================================================================

    /// Assign the single reviewer
    ///
    /// Allowed while the proposal is `draft` or `submitted`, so a submitted
    /// proposal can be handed to someone else before review starts. A verdict
    /// from the replaced reviewer that is still in flight is refused when it
    /// applies.
    ///
    /// # Errors
    /// - `Forbidden` unless the actor is an admin or heads the team's department
    /// - `InvalidState` once review has started (`under_review` or later)
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id, reviewer = %reviewer_id))]
    pub async fn assign_reviewer(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
        reviewer_id: UserId,
    ) -> LifecycleResult<Proposal> {
        let proposal = self.load(proposal_id).await?;
        if !actor.is_admin() {
            let department = match proposal.team_id {
                Some(team_id) => self.team(team_id).await?.department_id,
                None => None,
            };
            if !actor.heads(department) {
                return Err(LifecycleError::forbidden("assign a reviewer"));
            }
        }

        let proposal = self
            .store
            .transact(move |tx| {
                let mut proposal = live(tx, proposal_id)?;
                if !matches!(
                    proposal.status,
                    ProposalStatus::Draft | ProposalStatus::Submitted
                ) {
                    return Err(LifecycleError::invalid_state("assign a reviewer", proposal.status));
                }
                proposal.reviewer_id = Some(reviewer_id);
                proposal.updated_at = Utc::now();
                tx.update_proposal(&proposal)?;
                Ok(proposal)
            })
            .await?;

        info!("reviewer assigned");
        self.audit(
            AuditEntry::new("proposal", proposal_id, "proposal.reviewer_assigned", actor.user_id)
                .with_context(json!({ "reviewer_id": reviewer_id.0 })),
        )
        .await;
        self.notify(vec![reviewer_id], proposal_id, NotificationEvent::ReviewerAssigned)
            .await;
        Ok(proposal)
    }

    /// Assigned reviewer opens the review (`submitted → under_review`)
    ///
    /// # Errors
    /// - `Forbidden` unless the actor is the assigned reviewer
    /// - `InvalidTransition` from any status but `submitted`
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id))]
    pub async fn start_review(&self, proposal_id: ProposalId, actor: &Actor) -> LifecycleResult<Proposal> {
        let reviewer_id = actor.user_id;
        let (previous, proposal) = self
            .store
            .transact(move |tx| {
                let mut proposal = live(tx, proposal_id)?;
                if proposal.reviewer_id != Some(reviewer_id) {
                    return Err(LifecycleError::forbidden("start the review"));
                }
                let previous =
                    state_machine::transition(&mut proposal, ProposalStatus::UnderReview, Utc::now())?;
                tx.update_proposal(&proposal)?;
                Ok((previous, proposal))
            })
            .await?;

        info!("review started");
        self.audit(
            AuditEntry::new("proposal", proposal_id, "proposal.review_started", reviewer_id)
                .with_states(previous, proposal.status),
        )
        .await;
        Ok(proposal)
    }

    /// Soft-delete a proposal that has left `draft`; idempotent
    ///
    /// Archiving frees the team to start a new proposal.
    ///
    /// # Errors
    /// - `Forbidden` unless the actor is an admin
    /// - `InvalidState` for drafts, which are deleted instead
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id))]
    pub async fn archive(&self, proposal_id: ProposalId, actor: &Actor) -> LifecycleResult<Proposal> {
        if !actor.is_admin() {
            return Err(LifecycleError::forbidden("archive proposals"));
        }

        let (proposal, changed) = self
            .store
            .transact(move |tx| {
                let mut proposal = tx
                    .proposal(proposal_id)?
                    .ok_or(LifecycleError::NotFound(EntityKind::Proposal))?;
                if proposal.is_archived() {
                    return Ok((proposal, false));
                }
                if proposal.status == ProposalStatus::Draft {
                    return Err(LifecycleError::invalid_state("archive", proposal.status));
                }
                let now = Utc::now();
                proposal.archived_at = Some(now);
                proposal.updated_at = now;
                tx.update_proposal(&proposal)?;
                Ok((proposal, true))
            })
            .await?;

        if changed {
            info!("proposal archived");
            self.audit(AuditEntry::new("proposal", proposal_id, "proposal.archived", actor.user_id))
                .await;
        }
        Ok(proposal)
    }

    /// Change who can see the derived project
    ///
    /// # Errors
    /// - `NotFound` if the proposal has no project
    /// - `Forbidden` unless the actor is an admin or the approving reviewer
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id, visibility = ?visibility))]
    pub async fn set_project_visibility(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
        visibility: Visibility,
    ) -> LifecycleResult<DerivedRecord> {
        let caller = *actor;
        let (previous, project) = self
            .store
            .transact(move |tx| {
                let mut project = tx
                    .project_for_proposal(proposal_id)?
                    .ok_or(LifecycleError::NotFound(EntityKind::Project))?;
                if !caller.is_admin() && project.approved_by != caller.user_id {
                    return Err(LifecycleError::forbidden("change project visibility"));
                }
                let previous = project.visibility;
                project.visibility = visibility;
                tx.update_project(&project)?;
                Ok((previous, project))
            })
            .await?;

        if previous != visibility {
            info!("project visibility changed");
            self.audit(
                AuditEntry::new("project", project.id, "project.visibility_changed", actor.user_id)
                    .with_states(previous.as_str(), visibility.as_str()),
            )
            .await;
        }
        Ok(project)
    }

    /// Hand an upload to the file store
    ///
    /// # Errors
    /// - `InvalidInput` for an empty name, empty file or oversized file
    /// - `Collaborator` if the file store fails
    #[instrument(skip_all, fields(actor = %actor.user_id, file_name = %file_name, size = bytes.len()))]
    pub async fn store_attachment(
        &self,
        actor: &Actor,
        file_name: &str,
        bytes: &[u8],
    ) -> LifecycleResult<FileDescriptor> {
        if file_name.trim().is_empty() {
            return Err(LifecycleError::InvalidInput("file name is required".into()));
        }
        if bytes.is_empty() {
            return Err(LifecycleError::InvalidInput("attachment is empty".into()));
        }
        let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        if size > self.config.max_attachment_bytes {
            return Err(LifecycleError::InvalidInput(format!(
                "attachment exceeds {} bytes",
                self.config.max_attachment_bytes
            )));
        }

        let descriptor = self.collaborators.files.store(file_name, bytes).await?;
        debug!(url = %descriptor.url, "attachment stored");
        Ok(descriptor)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Proposal, latest version and advisory feedback
    ///
    /// Advisory analysis is bounded by the configured timeout and never fails
    /// the read.
    ///
    /// # Errors
    /// - `NotFound` for an unknown proposal
    /// - `Forbidden` if the actor may not see it
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id))]
    pub async fn get_proposal(&self, proposal_id: ProposalId, actor: &Actor) -> LifecycleResult<ProposalView> {
        let proposal = self.load(proposal_id).await?;
        self.authorize_read(actor, &proposal).await?;

        let latest_version = self
            .store
            .transact(move |tx| match tx.latest_version_number(proposal_id)? {
                Some(number) => tx.version_by_number(proposal_id, number),
                None => Ok(None),
            })
            .await
            .map_err(LifecycleError::from)?;
        let advisory = match &latest_version {
            Some(version) => self.advisory(&version.content).await,
            None => None,
        };

        debug!(has_advisory = advisory.is_some(), "proposal read");
        Ok(ProposalView {
            proposal,
            latest_version,
            advisory,
        })
    }

    /// All versions, newest first
    ///
    /// # Errors
    /// `NotFound` or `Forbidden`, as for [`Self::get_proposal`]
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id))]
    pub async fn list_versions(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> LifecycleResult<Vec<ProposalVersion>> {
        let proposal = self.load(proposal_id).await?;
        self.authorize_read(actor, &proposal).await?;
        self.store
            .transact(move |tx| VersionStore::new(tx).list_versions(proposal_id))
            .await
    }

    /// Decisions in the order they were recorded
    ///
    /// # Errors
    /// `NotFound` or `Forbidden`, as for [`Self::get_proposal`]
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id))]
    pub async fn list_decisions(
        &self,
        proposal_id: ProposalId,
        actor: &Actor,
    ) -> LifecycleResult<Vec<Decision>> {
        let proposal = self.load(proposal_id).await?;
        self.authorize_read(actor, &proposal).await?;
        self.store
            .transact(move |tx| tx.decisions(proposal_id))
            .await
            .map_err(LifecycleError::from)
    }

    /// Proposals matching `filter` that the actor may see, newest first
    ///
    /// # Errors
    /// `Storage` or `Collaborator` failures only
    #[instrument(skip_all, fields(actor = %actor.user_id))]
    pub async fn list_proposals(
        &self,
        actor: &Actor,
        filter: ProposalFilter,
    ) -> LifecycleResult<Vec<Proposal>> {
        let proposals = self
            .store
            .transact(move |tx| tx.proposals(&filter))
            .await
            .map_err(LifecycleError::from)?;
        if actor.is_admin() {
            return Ok(proposals);
        }

        let mut teams = HashMap::new();
        let mut visible = Vec::with_capacity(proposals.len());
        for proposal in proposals {
            if self.may_read(actor, &proposal, &mut teams).await? {
                visible.push(proposal);
            }
        }
        debug!(count = visible.len(), "proposals listed");
        Ok(visible)
    }

    /// The derived project of an approved proposal
    ///
    /// Public projects are visible to everyone.
    ///
    /// # Errors
    /// - `NotFound` if there is no project
    /// - `Forbidden` for a restricted project the actor may not see
    #[instrument(skip_all, fields(proposal = %proposal_id, actor = %actor.user_id))]
    pub async fn get_project(&self, proposal_id: ProposalId, actor: &Actor) -> LifecycleResult<DerivedRecord> {
        let project = self
            .store
            .transact(move |tx| tx.project_for_proposal(proposal_id))
            .await
            .map_err(LifecycleError::from)?
            .ok_or(LifecycleError::NotFound(EntityKind::Project))?;
        if project.visibility != Visibility::Public {
            let proposal = self.load(proposal_id).await?;
            self.authorize_read(actor, &proposal).await?;
        }
        Ok(project)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Load a proposal, archived ones included
    async fn load(&self, proposal_id: ProposalId) -> LifecycleResult<Proposal> {
        self.store
            .transact(move |tx| tx.proposal(proposal_id))
            .await
            .map_err(LifecycleError::from)?
            .ok_or(LifecycleError::NotFound(EntityKind::Proposal))
    }

    async fn team(&self, team_id: TeamId) -> LifecycleResult<TeamInfo> {
        self.collaborators
            .teams
            .get_team(team_id)
            .await?
            .ok_or(LifecycleError::NotFound(EntityKind::Team))
    }

    /// Team leader, or the creator of a proposal without a team
    async fn authorize_author(
        &self,
        actor: &Actor,
        proposal: &Proposal,
        action: &'static str,
    ) -> LifecycleResult<()> {
        let author = match proposal.team_id {
            Some(team_id) => self.team(team_id).await?.leader_id,
            None => proposal.created_by,
        };
        if author == actor.user_id {
            Ok(())
        } else {
            Err(LifecycleError::forbidden(action))
        }
    }

    async fn authorize_read(&self, actor: &Actor, proposal: &Proposal) -> LifecycleResult<()> {
        if self.may_read(actor, proposal, &mut HashMap::new()).await? {
            Ok(())
        } else {
            Err(LifecycleError::forbidden("view this proposal"))
        }
    }

    /// Admins, the assigned reviewer, the creator, team members and the head
    /// of the team's department
    async fn may_read(
        &self,
        actor: &Actor,
        proposal: &Proposal,
        teams: &mut HashMap<TeamId, Option<TeamInfo>>,
    ) -> LifecycleResult<bool> {
        if actor.is_admin()
            || proposal.reviewer_id == Some(actor.user_id)
            || proposal.created_by == actor.user_id
        {
            return Ok(true);
        }
        let Some(team_id) = proposal.team_id else {
            return Ok(false);
        };
        let team = match teams.get(&team_id) {
            Some(cached) => cached.clone(),
            None => {
                let fetched = self.collaborators.teams.get_team(team_id).await?;
                teams.insert(team_id, fetched.clone());
                fetched
            }
        };
        Ok(team.is_some_and(|team| team.includes(actor.user_id) || actor.heads(team.department_id)))
    }

    async fn advisory(&self, content: &ProposalContent) -> Option<AdvisoryReport> {
        let analyzer = self.collaborators.advisory.as_ref()?;
        match tokio::time::timeout(self.config.advisory_timeout(), analyzer.analyze(content)).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => {
                warn!(error = %e, "advisory analysis failed");
                None
            }
            Err(_) => {
                warn!(timeout_ms = self.config.advisory_timeout_ms, "advisory analysis timed out");
                None
            }
        }
    }

    async fn audit(&self, entry: AuditEntry) {
        let action = entry.action.clone();
        if let Err(e) = self.collaborators.audit.record(entry).await {
            warn!(error = %e, %action, "audit record failed");
        }
    }

    async fn notify(&self, recipients: Vec<UserId>, proposal_id: ProposalId, event: NotificationEvent) {
        if recipients.is_empty() {
            return;
        }
        let notification = Notification {
            recipients,
            proposal_id,
            event,
        };
        if let Err(e) = self.collaborators.notifier.notify(notification).await {
            warn!(error = %e, ?event, "notification failed");
        }
    }
}

/// Load a proposal that may still be mutated
fn live(tx: &mut dyn StoreTx, proposal_id: ProposalId) -> LifecycleResult<Proposal> {
    tx.proposal(proposal_id)?
        .filter(|p| !p.is_archived())
        .ok_or(LifecycleError::NotFound(EntityKind::Proposal))
}

fn conflict_as(err: StoreError, message: &str) -> LifecycleError {
    match err {
        StoreError::Conflict(_) => LifecycleError::Conflict(message.to_string()),
        other => other.into(),
    }
}
