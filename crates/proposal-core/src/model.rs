//! Persistent entities of the proposal lifecycle
//!
//! - [`Proposal`]: the stateful root
//! - [`ProposalVersion`]: an immutable content snapshot (once locked)
//! - [`Decision`]: a reviewer verdict, never updated
//! - [`DerivedRecord`]: the project created exactly once on approval

use crate::content::ProposalContent;
use crate::error::ParseEnumError;
use crate::ids::{DecisionId, DepartmentId, ProjectId, ProposalId, TeamId, UserId, VersionId};
use crate::status::ProposalStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Root workflow entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Identifier
    pub id: ProposalId,
    /// Owning team, if attached
    pub team_id: Option<TeamId>,
    /// Assigned reviewer, if any
    pub reviewer_id: Option<UserId>,
    /// Current lifecycle status
    pub status: ProposalStatus,
    /// Author who created the draft
    pub created_by: UserId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status or content change
    pub updated_at: DateTime<Utc>,
    /// First time the proposal left `draft`
    pub first_submitted_at: Option<DateTime<Utc>>,
    /// Soft-delete marker
    pub archived_at: Option<DateTime<Utc>>,
}

impl Proposal {
    /// New proposal in `draft`
    #[must_use]
    pub fn new_draft(team_id: Option<TeamId>, created_by: UserId, at: DateTime<Utc>) -> Self {
        Self {
            id: ProposalId::new(),
            team_id,
            reviewer_id: None,
            status: ProposalStatus::Draft,
            created_by,
            created_at: at,
            updated_at: at,
            first_submitted_at: None,
            archived_at: None,
        }
    }

    /// Has the proposal ever left `draft`
    #[inline]
    #[must_use]
    pub fn was_submitted(&self) -> bool {
        self.first_submitted_at.is_some()
    }

    /// Soft-deleted
    #[inline]
    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.archived_at.is_some()
    }

    /// Occupies its team's single active slot
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active() && !self.is_archived()
    }
}

/// One content snapshot of a proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalVersion {
    /// Identifier
    pub id: VersionId,
    /// Owning proposal
    pub proposal_id: ProposalId,
    /// 1-based, contiguous per proposal
    pub version_number: u32,
    /// Content snapshot
    pub content: ProposalContent,
    /// Set by an `approve` decision on this version
    pub is_approved: bool,
    /// Set when this version is submitted; content is read-only afterwards
    pub locked_at: Option<DateTime<Utc>>,
    /// Author of this version
    pub created_by: UserId,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl ProposalVersion {
    /// New unlocked version
    #[must_use]
    pub fn new(
        proposal_id: ProposalId,
        version_number: u32,
        content: ProposalContent,
        created_by: UserId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: VersionId::new(),
            proposal_id,
            version_number,
            content,
            is_approved: false,
            locked_at: None,
            created_by,
            created_at: at,
        }
    }

    /// Content is read-only
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }
}

/// Reviewer verdict kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Accept; creates the derived project
    Approve,
    /// Send back for changes
    Revise,
    /// Refuse; terminal
    Reject,
}

impl DecisionKind {
    /// Stable storage representation
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            DecisionKind::Approve => "approve",
            DecisionKind::Revise => "revise",
            DecisionKind::Reject => "reject",
        }
    }

    /// Status the proposal moves to once this verdict is applied
    #[inline]
    #[must_use]
    pub const fn target_status(self) -> ProposalStatus {
        match self {
            DecisionKind::Approve => ProposalStatus::Approved,
            DecisionKind::Revise => ProposalStatus::RevisionRequired,
            DecisionKind::Reject => ProposalStatus::Rejected,
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(DecisionKind::Approve),
            "revise" => Ok(DecisionKind::Revise),
            "reject" => Ok(DecisionKind::Reject),
            other => Err(ParseEnumError::new("decision kind", other)),
        }
    }
}

/// Immutable reviewer verdict on one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Identifier
    pub id: DecisionId,
    /// Reviewed proposal
    pub proposal_id: ProposalId,
    /// Reviewed version
    pub version_id: VersionId,
    /// Reviewer who decided
    pub reviewer_id: UserId,
    /// Verdict
    pub kind: DecisionKind,
    /// Required justification
    pub justification: String,
    /// When the verdict was recorded
    pub created_at: DateTime<Utc>,
}

/// Who may see a derived project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Department staff and the team only
    #[default]
    Restricted,
    /// Listed publicly
    Public,
}

impl Visibility {
    /// Stable storage representation
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Visibility::Restricted => "restricted",
            Visibility::Public => "public",
        }
    }
}

impl FromStr for Visibility {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restricted" => Ok(Visibility::Restricted),
            "public" => Ok(Visibility::Public),
            other => Err(ParseEnumError::new("visibility", other)),
        }
    }
}

/// Institutional project record created on approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRecord {
    /// Identifier
    pub id: ProjectId,
    /// Approved proposal (unique)
    pub proposal_id: ProposalId,
    /// Version the approval applied to
    pub approved_version_id: VersionId,
    /// Title snapshot
    pub title: String,
    /// Problem statement snapshot
    pub problem_statement: String,
    /// Objectives snapshot
    pub objectives: String,
    /// Expected outcomes snapshot
    pub expected_outcomes: String,
    /// Owning team
    pub team_id: TeamId,
    /// Department context copied from the team
    pub department_id: Option<DepartmentId>,
    /// Reviewer who approved
    pub approved_by: UserId,
    /// Visibility flag
    pub visibility: Visibility,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl DerivedRecord {
    /// Snapshot the summary of an approved version
    #[must_use]
    pub fn from_approved_version(
        version: &ProposalVersion,
        team_id: TeamId,
        department_id: Option<DepartmentId>,
        approved_by: UserId,
        visibility: Visibility,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ProjectId::new(),
            proposal_id: version.proposal_id,
            approved_version_id: version.id,
            title: version.content.title.clone(),
            problem_statement: version.content.problem_statement.clone(),
            objectives: version.content.objectives.clone(),
            expected_outcomes: version.content.expected_outcomes.clone(),
            team_id,
            department_id,
            approved_by,
            visibility,
            created_at: at,
        }
    }
}

/// Listing filter for proposals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalFilter {
    /// Only this status
    pub status: Option<ProposalStatus>,
    /// Only this team
    pub team_id: Option<TeamId>,
    /// Only proposals assigned to this reviewer
    pub reviewer_id: Option<UserId>,
    /// Include soft-deleted proposals
    pub include_archived: bool,
}

impl ProposalFilter {
    /// Match everything that is not archived
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: ProposalStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// With team
    #[inline]
    #[must_use]
    pub fn with_team(mut self, team_id: TeamId) -> Self {
        self.team_id = Some(team_id);
        self
    }

    /// With reviewer
    #[inline]
    #[must_use]
    pub fn with_reviewer(mut self, reviewer_id: UserId) -> Self {
        self.reviewer_id = Some(reviewer_id);
        self
    }

    /// Include archived proposals
    #[inline]
    #[must_use]
    pub fn including_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }

    /// Does `proposal` pass this filter
    #[must_use]
    pub fn matches(&self, proposal: &Proposal) -> bool {
        self.status.map_or(true, |s| proposal.status == s)
            && self.team_id.map_or(true, |t| proposal.team_id == Some(t))
            && self
                .reviewer_id
                .map_or(true, |r| proposal.reviewer_id == Some(r))
            && (self.include_archived || !proposal.is_archived())
    }
}
