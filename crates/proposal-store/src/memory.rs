//! In-memory datastore
//!
//! Transactions hold the store-wide commit lock for their whole run, so they
//! are fully serialized. Reads go straight to the committed tables; the first
//! write in a transaction takes a private copy, which replaces the committed
//! tables only when the closure succeeds. A failed closure leaves no trace.

use crate::error::{StoreError, StoreResult};
use crate::repository::{Datastore, StoreTx};
use async_trait::async_trait;
use parking_lot::Mutex;
use proposal_core::{
    Decision, DerivedRecord, Proposal, ProposalFilter, ProposalId, ProposalVersion, TeamId,
    VersionId,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct Tables {
    proposals: BTreeMap<ProposalId, Proposal>,
    versions: BTreeMap<VersionId, ProposalVersion>,
    decisions: Vec<Decision>,
    projects: BTreeMap<ProposalId, DerivedRecord>,
}

/// Datastore kept entirely in process memory
///
/// Meant for tests and demos. The commit lock is a blocking lock held on the
/// calling task, and a writing transaction copies every table, so write cost
/// grows with the total number of rows.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn run<F, R, E>(&self, work: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut committed = self.tables.lock();
        let mut tx = MemoryTx {
            committed: &*committed,
            working: None,
        };
        let out = work(&mut tx)?;
        if let Some(working) = tx.working {
            *committed = working;
        }
        Ok(out)
    }
}

#[async_trait]
impl Datastore for InMemoryStore {
    async fn transact<F, R, E>(&self, work: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        self.run(work)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTx<'a> {
    committed: &'a Tables,
    working: Option<Tables>,
}

impl MemoryTx<'_> {
    fn read(&self) -> &Tables {
        self.working.as_ref().unwrap_or(self.committed)
    }

    fn write(&mut self) -> &mut Tables {
        let committed = self.committed;
        self.working.get_or_insert_with(|| committed.clone())
    }

    fn require_proposal(&self, id: ProposalId, operation: &'static str) -> StoreResult<()> {
        if self.read().proposals.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::Missing(operation))
        }
    }
}

impl StoreTx for MemoryTx<'_> {
    fn proposal(&mut self, id: ProposalId) -> StoreResult<Option<Proposal>> {
        Ok(self.read().proposals.get(&id).cloned())
    }

    fn insert_proposal(&mut self, proposal: &Proposal) -> StoreResult<()> {
        if self.read().proposals.contains_key(&proposal.id) {
            return Err(StoreError::Conflict("proposal id already exists".into()));
        }
        if let Some(team_id) = proposal.team_id.filter(|_| proposal.is_active()) {
            if self.active_proposal_for_team(team_id)?.is_some() {
                return Err(StoreError::Conflict(
                    "team already has an active proposal".into(),
                ));
            }
        }
        self.write().proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    fn update_proposal(&mut self, proposal: &Proposal) -> StoreResult<()> {
        match self.write().proposals.get_mut(&proposal.id) {
            Some(row) => {
                *row = proposal.clone();
                Ok(())
            }
            None => Err(StoreError::Missing("update proposal")),
        }
    }

    fn delete_proposal(&mut self, id: ProposalId) -> StoreResult<bool> {
        if !self.read().proposals.contains_key(&id) {
            return Ok(false);
        }
        let tables = self.write();
        tables.proposals.remove(&id);
        tables.versions.retain(|_, v| v.proposal_id != id);
        tables.decisions.retain(|d| d.proposal_id != id);
        tables.projects.remove(&id);
        Ok(true)
    }

    fn active_proposal_for_team(&mut self, team_id: TeamId) -> StoreResult<Option<ProposalId>> {
        Ok(self
            .read()
            .proposals
            .values()
            .find(|p| p.team_id == Some(team_id) && p.is_active())
            .map(|p| p.id))
    }

    fn proposals(&mut self, filter: &ProposalFilter) -> StoreResult<Vec<Proposal>> {
        let mut found: Vec<Proposal> = self
            .read()
            .proposals
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    fn version(&mut self, id: VersionId) -> StoreResult<Option<ProposalVersion>> {
        Ok(self.read().versions.get(&id).cloned())
    }

    fn version_by_number(
        &mut self,
        proposal_id: ProposalId,
        number: u32,
    ) -> StoreResult<Option<ProposalVersion>> {
        Ok(self
            .read()
            .versions
            .values()
            .find(|v| v.proposal_id == proposal_id && v.version_number == number)
            .cloned())
    }

    fn latest_version_number(&mut self, proposal_id: ProposalId) -> StoreResult<Option<u32>> {
        Ok(self
            .read()
            .versions
            .values()
            .filter(|v| v.proposal_id == proposal_id)
            .map(|v| v.version_number)
            .max())
    }

    fn insert_version(&mut self, version: &ProposalVersion) -> StoreResult<()> {
        self.require_proposal(version.proposal_id, "insert version")?;
        let taken = self.read().versions.values().any(|v| {
            v.id == version.id
                || (v.proposal_id == version.proposal_id
                    && v.version_number == version.version_number)
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "version {} already exists",
                version.version_number
            )));
        }
        self.write().versions.insert(version.id, version.clone());
        Ok(())
    }

    fn update_version(&mut self, version: &ProposalVersion) -> StoreResult<()> {
        match self.write().versions.get_mut(&version.id) {
            Some(row) => {
                *row = version.clone();
                Ok(())
            }
            None => Err(StoreError::Missing("update version")),
        }
    }

    fn versions(&mut self, proposal_id: ProposalId) -> StoreResult<Vec<ProposalVersion>> {
        let mut found: Vec<ProposalVersion> = self
            .read()
            .versions
            .values()
            .filter(|v| v.proposal_id == proposal_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(found)
    }

    fn insert_decision(&mut self, decision: &Decision) -> StoreResult<()> {
        self.require_proposal(decision.proposal_id, "insert decision")?;
        self.write().decisions.push(decision.clone());
        Ok(())
    }

    fn decisions(&mut self, proposal_id: ProposalId) -> StoreResult<Vec<Decision>> {
        Ok(self
            .read()
            .decisions
            .iter()
            .filter(|d| d.proposal_id == proposal_id)
            .cloned()
            .collect())
    }

    fn insert_project(&mut self, record: &DerivedRecord) -> StoreResult<()> {
        self.require_proposal(record.proposal_id, "insert project")?;
        if self.read().projects.contains_key(&record.proposal_id) {
            return Err(StoreError::Conflict(
                "proposal already has a derived project".into(),
            ));
        }
        self.write().projects.insert(record.proposal_id, record.clone());
        Ok(())
    }

    fn update_project(&mut self, record: &DerivedRecord) -> StoreResult<()> {
        match self.write().projects.get_mut(&record.proposal_id) {
            Some(row) if row.id == record.id => {
                row.visibility = record.visibility;
                Ok(())
            }
            _ => Err(StoreError::Missing("update project")),
        }
    }

    fn project_for_proposal(
        &mut self,
        proposal_id: ProposalId,
    ) -> StoreResult<Option<DerivedRecord>> {
        Ok(self.read().projects.get(&proposal_id).cloned())
    }
}
