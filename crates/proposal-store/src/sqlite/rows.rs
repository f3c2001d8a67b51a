//! Raw row shapes and their conversion into domain types.
//!
//! Rows are read into plain SQLite types first so that decoding failures
//! surface as `StoreError::Corruption` instead of driver errors.

use chrono::{DateTime, SecondsFormat, Utc};
use proposal_core::{
    Decision, DecisionKind, DepartmentId, DerivedRecord, FileDescriptor, Proposal,
    ProposalContent, ProposalStatus, ProposalVersion, TeamId, UserId, Visibility,
};
use rusqlite::Row;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

pub(super) const PROPOSAL_COLUMNS: &str = "id, team_id, reviewer_id, status, created_by, \
     created_at, updated_at, first_submitted_at, archived_at";

pub(super) const VERSION_COLUMNS: &str = "id, proposal_id, version_number, title, \
     problem_statement, objectives, methodology, timeline, expected_outcomes, file_url, \
     file_sha256, file_size, is_approved, locked_at, created_by, created_at";

pub(super) const DECISION_COLUMNS: &str =
    "id, proposal_id, version_id, reviewer_id, kind, justification, created_at";

pub(super) const PROJECT_COLUMNS: &str = "id, proposal_id, approved_version_id, title, \
     problem_statement, objectives, expected_outcomes, team_id, department_id, approved_by, \
     visibility, created_at";

// =============================================================================
// Scalar conversion helpers
// =============================================================================

/// Convert an external u64 reference to i64 for SQLite storage.
pub(super) fn to_db_int(value: u64, what: &'static str) -> StoreResult<i64> {
    i64::try_from(value).map_err(|_| {
        StoreError::storage(what, format!("{value} exceeds maximum storable value"))
    })
}

/// Convert a stored i64 back into an external u64 reference.
pub(super) fn from_db_int(value: i64, what: &'static str) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::corruption(format!("negative {what}")))
}

/// Timestamps are stored as RFC 3339 with nanoseconds so they sort lexically.
pub(super) fn to_db_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn from_db_time(raw: &str, what: &'static str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::corruption(what))
}

fn from_db_opt_time(raw: Option<String>, what: &'static str) -> StoreResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(|r| from_db_time(r, what)).transpose()
}

fn parse<T: FromStr>(raw: &str, what: &'static str) -> StoreResult<T> {
    raw.parse().map_err(|_| StoreError::corruption(what))
}

// =============================================================================
// Row types
// =============================================================================

pub(super) struct ProposalRow {
    id: String,
    team_id: Option<i64>,
    reviewer_id: Option<i64>,
    status: String,
    created_by: i64,
    created_at: String,
    updated_at: String,
    first_submitted_at: Option<String>,
    archived_at: Option<String>,
}

impl ProposalRow {
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            team_id: row.get(1)?,
            reviewer_id: row.get(2)?,
            status: row.get(3)?,
            created_by: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            first_submitted_at: row.get(7)?,
            archived_at: row.get(8)?,
        })
    }
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = StoreError;

    fn try_from(row: ProposalRow) -> StoreResult<Self> {
        Ok(Proposal {
            id: parse(&row.id, "proposal id")?,
            team_id: row
                .team_id
                .map(|v| from_db_int(v, "team id").map(TeamId))
                .transpose()?,
            reviewer_id: row
                .reviewer_id
                .map(|v| from_db_int(v, "reviewer id").map(UserId))
                .transpose()?,
            status: parse::<ProposalStatus>(&row.status, "proposal status")?,
            created_by: UserId(from_db_int(row.created_by, "creator id")?),
            created_at: from_db_time(&row.created_at, "proposal created_at")?,
            updated_at: from_db_time(&row.updated_at, "proposal updated_at")?,
            first_submitted_at: from_db_opt_time(row.first_submitted_at, "first_submitted_at")?,
            archived_at: from_db_opt_time(row.archived_at, "archived_at")?,
        })
    }
}

pub(super) struct VersionRow {
    id: String,
    proposal_id: String,
    version_number: i64,
    title: String,
    problem_statement: String,
    objectives: String,
    methodology: String,
    timeline: String,
    expected_outcomes: String,
    file_url: Option<String>,
    file_sha256: Option<String>,
    file_size: Option<i64>,
    is_approved: bool,
    locked_at: Option<String>,
    created_by: i64,
    created_at: String,
}

impl VersionRow {
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            proposal_id: row.get(1)?,
            version_number: row.get(2)?,
            title: row.get(3)?,
            problem_statement: row.get(4)?,
            objectives: row.get(5)?,
            methodology: row.get(6)?,
            timeline: row.get(7)?,
            expected_outcomes: row.get(8)?,
            file_url: row.get(9)?,
            file_sha256: row.get(10)?,
            file_size: row.get(11)?,
            is_approved: row.get(12)?,
            locked_at: row.get(13)?,
            created_by: row.get(14)?,
            created_at: row.get(15)?,
        })
    }
}

impl TryFrom<VersionRow> for ProposalVersion {
    type Error = StoreError;

    fn try_from(row: VersionRow) -> StoreResult<Self> {
        let attachment = match (row.file_url, row.file_sha256, row.file_size) {
            (Some(url), Some(sha256), Some(size)) => Some(FileDescriptor {
                url,
                sha256,
                byte_size: from_db_int(size, "file size")?,
            }),
            (None, None, None) => None,
            _ => return Err(StoreError::corruption("partial attachment descriptor")),
        };
        let version_number = u32::try_from(row.version_number)
            .map_err(|_| StoreError::corruption("version number"))?;

        Ok(ProposalVersion {
            id: parse(&row.id, "version id")?,
            proposal_id: parse(&row.proposal_id, "proposal id")?,
            version_number,
            content: ProposalContent {
                title: row.title,
                problem_statement: row.problem_statement,
                objectives: row.objectives,
                methodology: row.methodology,
                timeline: row.timeline,
                expected_outcomes: row.expected_outcomes,
                attachment,
            },
            is_approved: row.is_approved,
            locked_at: from_db_opt_time(row.locked_at, "locked_at")?,
            created_by: UserId(from_db_int(row.created_by, "creator id")?),
            created_at: from_db_time(&row.created_at, "version created_at")?,
        })
    }
}

pub(super) struct DecisionRow {
    id: String,
    proposal_id: String,
    version_id: String,
    reviewer_id: i64,
    kind: String,
    justification: String,
    created_at: String,
}

impl DecisionRow {
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            proposal_id: row.get(1)?,
            version_id: row.get(2)?,
            reviewer_id: row.get(3)?,
            kind: row.get(4)?,
            justification: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl TryFrom<DecisionRow> for Decision {
    type Error = StoreError;

    fn try_from(row: DecisionRow) -> StoreResult<Self> {
        Ok(Decision {
            id: parse(&row.id, "decision id")?,
            proposal_id: parse(&row.proposal_id, "proposal id")?,
            version_id: parse(&row.version_id, "version id")?,
            reviewer_id: UserId(from_db_int(row.reviewer_id, "reviewer id")?),
            kind: parse::<DecisionKind>(&row.kind, "decision kind")?,
            justification: row.justification,
            created_at: from_db_time(&row.created_at, "decision created_at")?,
        })
    }
}

pub(super) struct ProjectRow {
    id: String,
    proposal_id: String,
    approved_version_id: String,
    title: String,
    problem_statement: String,
    objectives: String,
    expected_outcomes: String,
    team_id: i64,
    department_id: Option<i64>,
    approved_by: i64,
    visibility: String,
    created_at: String,
}

impl ProjectRow {
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            proposal_id: row.get(1)?,
            approved_version_id: row.get(2)?,
            title: row.get(3)?,
            problem_statement: row.get(4)?,
            objectives: row.get(5)?,
            expected_outcomes: row.get(6)?,
            team_id: row.get(7)?,
            department_id: row.get(8)?,
            approved_by: row.get(9)?,
            visibility: row.get(10)?,
            created_at: row.get(11)?,
        })
    }
}

impl TryFrom<ProjectRow> for DerivedRecord {
    type Error = StoreError;

    fn try_from(row: ProjectRow) -> StoreResult<Self> {
        Ok(DerivedRecord {
            id: parse(&row.id, "project id")?,
            proposal_id: parse(&row.proposal_id, "proposal id")?,
            approved_version_id: parse(&row.approved_version_id, "version id")?,
            title: row.title,
            problem_statement: row.problem_statement,
            objectives: row.objectives,
            expected_outcomes: row.expected_outcomes,
            team_id: TeamId(from_db_int(row.team_id, "team id")?),
            department_id: row
                .department_id
                .map(|v| from_db_int(v, "department id").map(DepartmentId))
                .transpose()?,
            approved_by: UserId(from_db_int(row.approved_by, "approver id")?),
            visibility: parse::<Visibility>(&row.visibility, "visibility")?,
            created_at: from_db_time(&row.created_at, "project created_at")?,
        })
    }
}
