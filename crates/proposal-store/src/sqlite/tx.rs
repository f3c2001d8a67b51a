//! `StoreTx` over an open SQLite transaction.

use proposal_core::{
    Decision, DerivedRecord, Proposal, ProposalFilter, ProposalId, ProposalVersion, TeamId,
    VersionId,
};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};

use super::rows::{
    to_db_int, to_db_time, DecisionRow, ProjectRow, ProposalRow, VersionRow,
    DECISION_COLUMNS, PROJECT_COLUMNS, PROPOSAL_COLUMNS, VERSION_COLUMNS,
};
use crate::error::{StoreError, StoreResult};
use crate::repository::StoreTx;

/// Map a driver error, turning constraint violations into domain conflicts.
pub(super) fn classify(operation: &'static str, err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, message) = &err {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                return StoreError::Missing(operation);
            }
            return StoreError::Conflict(format!(
                "{operation}: {}",
                message.as_deref().unwrap_or("constraint violation")
            ));
        }
    }
    StoreError::storage(operation, err)
}

pub(super) struct SqliteTx<'t> {
    conn: &'t Connection,
}

impl<'t> SqliteTx<'t> {
    pub(super) fn new(conn: &'t Connection) -> Self {
        Self { conn }
    }

    fn query_opt<R, T>(
        &self,
        operation: &'static str,
        sql: &str,
        params: impl Params,
        map: fn(&Row<'_>) -> rusqlite::Result<R>,
    ) -> StoreResult<Option<T>>
    where
        T: TryFrom<R, Error = StoreError>,
    {
        self.conn
            .query_row(sql, params, map)
            .optional()
            .map_err(|e| classify(operation, e))?
            .map(T::try_from)
            .transpose()
    }

    fn query_all<R, T>(
        &self,
        operation: &'static str,
        sql: &str,
        params: impl Params,
        map: fn(&Row<'_>) -> rusqlite::Result<R>,
    ) -> StoreResult<Vec<T>>
    where
        T: TryFrom<R, Error = StoreError>,
    {
        let mut stmt = self
            .conn
            .prepare_cached(sql)
            .map_err(|e| classify(operation, e))?;
        let rows = stmt
            .query_map(params, map)
            .map_err(|e| classify(operation, e))?;
        let collected: StoreResult<Vec<T>> = rows
            .map(|row| row.map_err(|e| classify(operation, e)).and_then(T::try_from))
            .collect();
        collected
    }

    fn execute(&self, operation: &'static str, sql: &str, params: impl Params) -> StoreResult<usize> {
        self.conn
            .execute(sql, params)
            .map_err(|e| classify(operation, e))
    }
}

fn opt_int(value: Option<u64>, what: &'static str) -> StoreResult<Option<i64>> {
    value.map(|v| to_db_int(v, what)).transpose()
}

impl StoreTx for SqliteTx<'_> {
    fn proposal(&mut self, id: ProposalId) -> StoreResult<Option<Proposal>> {
        self.query_opt(
            "get proposal",
            &format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = ?1"),
            params![id.to_string()],
            ProposalRow::from_row,
        )
    }

    fn insert_proposal(&mut self, proposal: &Proposal) -> StoreResult<()> {
        let team_id = opt_int(proposal.team_id.map(|t| t.0), "team id")?;
        let reviewer_id = opt_int(proposal.reviewer_id.map(|r| r.0), "reviewer id")?;
        self.execute(
            "insert proposal",
            &format!(
                "INSERT INTO proposals ({PROPOSAL_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                proposal.id.to_string(),
                team_id,
                reviewer_id,
                proposal.status.as_str(),
                to_db_int(proposal.created_by.0, "creator id")?,
                to_db_time(proposal.created_at),
                to_db_time(proposal.updated_at),
                proposal.first_submitted_at.map(to_db_time),
                proposal.archived_at.map(to_db_time),
            ],
        )?;
        Ok(())
    }

    fn update_proposal(&mut self, proposal: &Proposal) -> StoreResult<()> {
        let team_id = opt_int(proposal.team_id.map(|t| t.0), "team id")?;
        let reviewer_id = opt_int(proposal.reviewer_id.map(|r| r.0), "reviewer id")?;
        let changed = self.execute(
            "update proposal",
            "UPDATE proposals SET team_id = ?2, reviewer_id = ?3, status = ?4, updated_at = ?5,
                 first_submitted_at = ?6, archived_at = ?7
             WHERE id = ?1",
            params![
                proposal.id.to_string(),
                team_id,
                reviewer_id,
                proposal.status.as_str(),
                to_db_time(proposal.updated_at),
                proposal.first_submitted_at.map(to_db_time),
                proposal.archived_at.map(to_db_time),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::Missing("update proposal"));
        }
        Ok(())
    }

    fn delete_proposal(&mut self, id: ProposalId) -> StoreResult<bool> {
        let changed = self.execute(
            "delete proposal",
            "DELETE FROM proposals WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn active_proposal_for_team(&mut self, team_id: TeamId) -> StoreResult<Option<ProposalId>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM proposals
                 WHERE team_id = ?1
                   AND archived_at IS NULL
                   AND status NOT IN ('approved', 'rejected')
                 LIMIT 1",
                params![to_db_int(team_id.0, "team id")?],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| classify("active proposal for team", e))?;
        raw.map(|id| {
            id.parse()
                .map_err(|_| StoreError::corruption("proposal id"))
        })
        .transpose()
    }

    fn proposals(&mut self, filter: &ProposalFilter) -> StoreResult<Vec<Proposal>> {
        self.query_all(
            "list proposals",
            &format!(
                "SELECT {PROPOSAL_COLUMNS} FROM proposals
                 WHERE (?1 IS NULL OR status = ?1)
                   AND (?2 IS NULL OR team_id = ?2)
                   AND (?3 IS NULL OR reviewer_id = ?3)
                   AND (?4 OR archived_at IS NULL)
                 ORDER BY created_at DESC, id DESC"
            ),
            params![
                filter.status.map(|s| s.as_str()),
                opt_int(filter.team_id.map(|t| t.0), "team id")?,
                opt_int(filter.reviewer_id.map(|r| r.0), "reviewer id")?,
                filter.include_archived,
            ],
            ProposalRow::from_row,
        )
    }

    fn version(&mut self, id: VersionId) -> StoreResult<Option<ProposalVersion>> {
        self.query_opt(
            "get version",
            &format!("SELECT {VERSION_COLUMNS} FROM proposal_versions WHERE id = ?1"),
            params![id.to_string()],
            VersionRow::from_row,
        )
    }

    fn version_by_number(
        &mut self,
        proposal_id: ProposalId,
        number: u32,
    ) -> StoreResult<Option<ProposalVersion>> {
        self.query_opt(
            "get version by number",
            &format!(
                "SELECT {VERSION_COLUMNS} FROM proposal_versions
                 WHERE proposal_id = ?1 AND version_number = ?2"
            ),
            params![proposal_id.to_string(), i64::from(number)],
            VersionRow::from_row,
        )
    }

    fn latest_version_number(&mut self, proposal_id: ProposalId) -> StoreResult<Option<u32>> {
        let max: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(version_number) FROM proposal_versions WHERE proposal_id = ?1",
                params![proposal_id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| classify("latest version number", e))?;
        max.map(|n| u32::try_from(n).map_err(|_| StoreError::corruption("version number")))
            .transpose()
    }

    fn insert_version(&mut self, version: &ProposalVersion) -> StoreResult<()> {
        let attachment = version.content.attachment.as_ref();
        let file_size = attachment
            .map(|a| to_db_int(a.byte_size, "file size"))
            .transpose()?;
        self.execute(
            "insert version",
            &format!(
                "INSERT INTO proposal_versions ({VERSION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
            ),
            params![
                version.id.to_string(),
                version.proposal_id.to_string(),
                i64::from(version.version_number),
                version.content.title,
                version.content.problem_statement,
                version.content.objectives,
                version.content.methodology,
                version.content.timeline,
                version.content.expected_outcomes,
                attachment.map(|a| a.url.as_str()),
                attachment.map(|a| a.sha256.as_str()),
                file_size,
                version.is_approved,
                version.locked_at.map(to_db_time),
                to_db_int(version.created_by.0, "creator id")?,
                to_db_time(version.created_at),
            ],
        )?;
        Ok(())
    }

    fn update_version(&mut self, version: &ProposalVersion) -> StoreResult<()> {
        let attachment = version.content.attachment.as_ref();
        let file_size = attachment
            .map(|a| to_db_int(a.byte_size, "file size"))
            .transpose()?;
        let changed = self.execute(
            "update version",
            "UPDATE proposal_versions SET title = ?2, problem_statement = ?3, objectives = ?4,
                 methodology = ?5, timeline = ?6, expected_outcomes = ?7, file_url = ?8,
                 file_sha256 = ?9, file_size = ?10, is_approved = ?11, locked_at = ?12
             WHERE id = ?1",
            params![
                version.id.to_string(),
                version.content.title,
                version.content.problem_statement,
                version.content.objectives,
                version.content.methodology,
                version.content.timeline,
                version.content.expected_outcomes,
                attachment.map(|a| a.url.as_str()),
                attachment.map(|a| a.sha256.as_str()),
                file_size,
                version.is_approved,
                version.locked_at.map(to_db_time),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::Missing("update version"));
        }
        Ok(())
    }

    fn versions(&mut self, proposal_id: ProposalId) -> StoreResult<Vec<ProposalVersion>> {
        self.query_all(
            "list versions",
            &format!(
                "SELECT {VERSION_COLUMNS} FROM proposal_versions
                 WHERE proposal_id = ?1
                 ORDER BY version_number DESC"
            ),
            params![proposal_id.to_string()],
            VersionRow::from_row,
        )
    }

    fn insert_decision(&mut self, decision: &Decision) -> StoreResult<()> {
        self.execute(
            "insert decision",
            &format!("INSERT INTO decisions ({DECISION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                decision.id.to_string(),
                decision.proposal_id.to_string(),
                decision.version_id.to_string(),
                to_db_int(decision.reviewer_id.0, "reviewer id")?,
                decision.kind.as_str(),
                decision.justification,
                to_db_time(decision.created_at),
            ],
        )?;
        Ok(())
    }

    fn decisions(&mut self, proposal_id: ProposalId) -> StoreResult<Vec<Decision>> {
        self.query_all(
            "list decisions",
            &format!(
                "SELECT {DECISION_COLUMNS} FROM decisions
                 WHERE proposal_id = ?1
                 ORDER BY rowid ASC"
            ),
            params![proposal_id.to_string()],
            DecisionRow::from_row,
        )
    }

    fn insert_project(&mut self, record: &DerivedRecord) -> StoreResult<()> {
        let department_id = opt_int(record.department_id.map(|d| d.0), "department id")?;
        self.execute(
            "insert project",
            &format!(
                "INSERT INTO projects ({PROJECT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                record.id.to_string(),
                record.proposal_id.to_string(),
                record.approved_version_id.to_string(),
                record.title,
                record.problem_statement,
                record.objectives,
                record.expected_outcomes,
                to_db_int(record.team_id.0, "team id")?,
                department_id,
                to_db_int(record.approved_by.0, "approver id")?,
                record.visibility.as_str(),
                to_db_time(record.created_at),
            ],
        )?;
        Ok(())
    }

    fn update_project(&mut self, record: &DerivedRecord) -> StoreResult<()> {
        // Only visibility is mutable; the summary is a frozen snapshot.
        let changed = self.execute(
            "update project",
            "UPDATE projects SET visibility = ?3 WHERE id = ?1 AND proposal_id = ?2",
            params![
                record.id.to_string(),
                record.proposal_id.to_string(),
                record.visibility.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::Missing("update project"));
        }
        Ok(())
    }

    fn project_for_proposal(
        &mut self,
        proposal_id: ProposalId,
    ) -> StoreResult<Option<DerivedRecord>> {
        self.query_opt(
            "get project",
            &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE proposal_id = ?1"),
            params![proposal_id.to_string()],
            ProjectRow::from_row,
        )
    }
}
