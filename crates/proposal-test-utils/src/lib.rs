//! Testing utilities for the proposal lifecycle workspace
//!
//! Shared fixtures, a seeded service harness, and a datastore wrapper that
//! injects failures at chosen write points.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use proposal_core::{
    Decision, DepartmentId, DerivedRecord, Proposal, ProposalContent, ProposalFilter, ProposalId,
    ProposalVersion, TeamId, UserId, VersionId,
};
use proposal_engine::collaborators::memory::{
    InMemoryFileStore, RecordingAuditSink, RecordingNotifier, StaticTeamDirectory,
};
use proposal_engine::{Actor, Collaborators, EngineConfig, LifecycleService, Role, TeamInfo};
use proposal_store::{Datastore, InMemoryStore, SqliteStore, StoreError, StoreResult, StoreTx};
use std::sync::Arc;

// =============================================================================
// Fixtures
// =============================================================================

pub const TEAM: TeamId = TeamId(7);
pub const OTHER_TEAM: TeamId = TeamId(8);
pub const DEPARTMENT: DepartmentId = DepartmentId(4);
pub const OTHER_DEPARTMENT: DepartmentId = DepartmentId(5);

pub const ADMIN: UserId = UserId(1);
pub const LEADER: UserId = UserId(100);
pub const MEMBER: UserId = UserId(101);
pub const OTHER_LEADER: UserId = UserId(110);
pub const OUTSIDER: UserId = UserId(150);
pub const REVIEWER: UserId = UserId(200);
pub const OTHER_REVIEWER: UserId = UserId(201);
pub const DEPARTMENT_HEAD: UserId = UserId(300);

pub fn admin() -> Actor {
    Actor::new(ADMIN, Role::Admin)
}

pub fn leader() -> Actor {
    Actor::new(LEADER, Role::Student)
}

pub fn member() -> Actor {
    Actor::new(MEMBER, Role::Student)
}

pub fn other_leader() -> Actor {
    Actor::new(OTHER_LEADER, Role::Student)
}

pub fn outsider() -> Actor {
    Actor::new(OUTSIDER, Role::Student)
}

pub fn reviewer() -> Actor {
    Actor::new(REVIEWER, Role::Supervisor).in_department(DEPARTMENT)
}

pub fn other_reviewer() -> Actor {
    Actor::new(OTHER_REVIEWER, Role::Supervisor).in_department(DEPARTMENT)
}

pub fn department_head() -> Actor {
    Actor::new(DEPARTMENT_HEAD, Role::DepartmentHead).in_department(DEPARTMENT)
}

pub fn foreign_department_head() -> Actor {
    Actor::new(DEPARTMENT_HEAD, Role::DepartmentHead).in_department(OTHER_DEPARTMENT)
}

pub fn sample_content() -> ProposalContent {
    ProposalContent::new(
        "Campus energy dashboard",
        "Nobody knows which buildings waste the most electricity",
    )
    .with_objectives("Publish live consumption per building")
    .with_methodology("Read smart meters, aggregate hourly, visualize")
    .with_expected_outcomes("A public dashboard and a ranked list of retrofits")
}

pub fn revised_content(revision: u32) -> ProposalContent {
    sample_content()
        .with_timeline(format!("Revision {revision}: meters in month 1, dashboard by month 4"))
}

pub const JUSTIFICATION: &str = "Reasoned verdict with enough detail";

// =============================================================================
// Harness
// =============================================================================

/// Service wired to in-memory collaborators with two seeded teams
///
/// - team 7: leader 100, member 101, department 4, not finalized
/// - team 8: leader 110, department 5, finalized
pub struct Harness<S> {
    pub service: LifecycleService<S>,
    pub store: Arc<S>,
    pub teams: Arc<StaticTeamDirectory>,
    pub files: Arc<InMemoryFileStore>,
    pub audit: Arc<RecordingAuditSink>,
    pub notifier: Arc<RecordingNotifier>,
}

impl<S: Datastore> Harness<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: S, config: EngineConfig) -> Self {
        Self::build(store, config, |collaborators| collaborators)
    }

    /// Replace collaborators before the service is built
    pub fn build(
        store: S,
        config: EngineConfig,
        customize: impl FnOnce(Collaborators) -> Collaborators,
    ) -> Self {
        let store = Arc::new(store);
        let teams = Arc::new(StaticTeamDirectory::new());
        teams.insert(TeamInfo {
            team_id: TEAM,
            leader_id: LEADER,
            is_finalized: false,
            member_ids: vec![MEMBER],
            department_id: Some(DEPARTMENT),
        });
        teams.insert(TeamInfo {
            team_id: OTHER_TEAM,
            leader_id: OTHER_LEADER,
            is_finalized: true,
            member_ids: vec![],
            department_id: Some(OTHER_DEPARTMENT),
        });
        let files = Arc::new(InMemoryFileStore::new());
        let audit = Arc::new(RecordingAuditSink::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let collaborators = customize(Collaborators::new(
            teams.clone(),
            files.clone(),
            audit.clone(),
            notifier.clone(),
        ));
        let service = LifecycleService::new(Arc::clone(&store), collaborators, config);
        Self {
            service,
            store,
            teams,
            files,
            audit,
            notifier,
        }
    }

    pub fn finalize_team(&self) {
        self.teams.finalize(TEAM);
    }

    /// Draft for team 7 with reviewer 200 assigned; not submitted
    pub async fn draft_with_reviewer(&self) -> (ProposalId, VersionId) {
        let (proposal, v1) = self
            .service
            .create_draft(&leader(), TEAM, sample_content())
            .await
            .expect("create draft");
        self.service
            .assign_reviewer(proposal.id, &admin(), REVIEWER)
            .await
            .expect("assign reviewer");
        (proposal.id, v1.id)
    }

    /// Draft for team 7, reviewer assigned, team finalized, submitted
    pub async fn submitted_proposal(&self) -> (ProposalId, VersionId) {
        let ids = self.draft_with_reviewer().await;
        self.finalize_team();
        self.service
            .submit(ids.0, &leader(), TEAM)
            .await
            .expect("submit");
        ids
    }
}

pub fn in_memory_harness() -> Harness<InMemoryStore> {
    Harness::new(InMemoryStore::new())
}

pub fn sqlite_harness() -> Harness<SqliteStore> {
    Harness::new(SqliteStore::open_in_memory().expect("open sqlite"))
}

// =============================================================================
// Failure injection
// =============================================================================

/// Write operation that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    InsertProposal,
    UpdateProposal,
    InsertVersion,
    UpdateVersion,
    InsertDecision,
    InsertProject,
}

/// Write run between two transactions of the code under test
pub type InterleavedWrite = Box<dyn FnOnce(&mut dyn StoreTx) -> StoreResult<()> + Send>;

/// Datastore wrapper that fails the armed write point with a storage error,
/// and can slip a foreign write in right after a decision is recorded
pub struct FaultyStore<S> {
    inner: S,
    armed: Mutex<Option<FaultPoint>>,
    after_decision: Mutex<Option<InterleavedWrite>>,
}

impl<S> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            armed: Mutex::new(None),
            after_decision: Mutex::new(None),
        }
    }

    pub fn fail_on(&self, point: FaultPoint) {
        *self.armed.lock() = Some(point);
    }

    pub fn disarm(&self) {
        *self.armed.lock() = None;
    }

    /// Commit `write` in its own transaction as soon as the next transaction
    /// that inserts a decision has committed
    pub fn after_next_decision(
        &self,
        write: impl FnOnce(&mut dyn StoreTx) -> StoreResult<()> + Send + 'static,
    ) {
        *self.after_decision.lock() = Some(Box::new(write));
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: Datastore> Datastore for FaultyStore<S> {
    async fn transact<F, R, E>(&self, work: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let armed = *self.armed.lock();
        let (out, decided) = self
            .inner
            .transact(move |tx| {
                let mut faulty = FaultyTx {
                    inner: tx,
                    armed,
                    decided: false,
                };
                let out = work(&mut faulty)?;
                Ok::<_, E>((out, faulty.decided))
            })
            .await?;

        if decided {
            let pending = self.after_decision.lock().take();
            if let Some(write) = pending {
                self.inner
                    .transact(move |tx| write(tx))
                    .await
                    .map_err(E::from)?;
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "faulty"
    }
}

struct FaultyTx<'a> {
    inner: &'a mut dyn StoreTx,
    armed: Option<FaultPoint>,
    decided: bool,
}

impl FaultyTx<'_> {
    fn check(&self, point: FaultPoint) -> StoreResult<()> {
        if self.armed == Some(point) {
            Err(StoreError::storage("injected fault", format!("{point:?}")))
        } else {
            Ok(())
        }
    }
}

impl StoreTx for FaultyTx<'_> {
    fn proposal(&mut self, id: ProposalId) -> StoreResult<Option<Proposal>> {
        self.inner.proposal(id)
    }

    fn insert_proposal(&mut self, proposal: &Proposal) -> StoreResult<()> {
        self.check(FaultPoint::InsertProposal)?;
        self.inner.insert_proposal(proposal)
    }

    fn update_proposal(&mut self, proposal: &Proposal) -> StoreResult<()> {
        self.check(FaultPoint::UpdateProposal)?;
        self.inner.update_proposal(proposal)
    }

    fn delete_proposal(&mut self, id: ProposalId) -> StoreResult<bool> {
        self.inner.delete_proposal(id)
    }

    fn active_proposal_for_team(&mut self, team_id: TeamId) -> StoreResult<Option<ProposalId>> {
        self.inner.active_proposal_for_team(team_id)
    }

    fn proposals(&mut self, filter: &ProposalFilter) -> StoreResult<Vec<Proposal>> {
        self.inner.proposals(filter)
    }

    fn version(&mut self, id: VersionId) -> StoreResult<Option<ProposalVersion>> {
        self.inner.version(id)
    }

    fn version_by_number(
        &mut self,
        proposal_id: ProposalId,
        number: u32,
    ) -> StoreResult<Option<ProposalVersion>> {
        self.inner.version_by_number(proposal_id, number)
    }

    fn latest_version_number(&mut self, proposal_id: ProposalId) -> StoreResult<Option<u32>> {
        self.inner.latest_version_number(proposal_id)
    }

    fn insert_version(&mut self, version: &ProposalVersion) -> StoreResult<()> {
        self.check(FaultPoint::InsertVersion)?;
        self.inner.insert_version(version)
    }

    fn update_version(&mut self, version: &ProposalVersion) -> StoreResult<()> {
        self.check(FaultPoint::UpdateVersion)?;
        self.inner.update_version(version)
    }

    fn versions(&mut self, proposal_id: ProposalId) -> StoreResult<Vec<ProposalVersion>> {
        self.inner.versions(proposal_id)
    }

    fn insert_decision(&mut self, decision: &Decision) -> StoreResult<()> {
        self.check(FaultPoint::InsertDecision)?;
        self.inner.insert_decision(decision)?;
        self.decided = true;
        Ok(())
    }

    fn decisions(&mut self, proposal_id: ProposalId) -> StoreResult<Vec<Decision>> {
        self.inner.decisions(proposal_id)
    }

    fn insert_project(&mut self, record: &DerivedRecord) -> StoreResult<()> {
        self.check(FaultPoint::InsertProject)?;
        self.inner.insert_project(record)
    }

    fn update_project(&mut self, record: &DerivedRecord) -> StoreResult<()> {
        self.inner.update_project(record)
    }

    fn project_for_proposal(
        &mut self,
        proposal_id: ProposalId,
    ) -> StoreResult<Option<DerivedRecord>> {
        self.inner.project_for_proposal(proposal_id)
    }
}
