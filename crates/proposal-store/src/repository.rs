//! Datastore abstraction
//!
//! Every read and write happens inside [`Datastore::transact`]. The closure
//! receives a [`StoreTx`] handle; returning `Ok` commits everything it did,
//! returning `Err` discards all of it. Backends serialize write transactions,
//! so a value read inside the closure (for example the highest version
//! number) cannot change before the closure's own write lands.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use proposal_core::{
    Decision, DerivedRecord, Proposal, ProposalFilter, ProposalId, ProposalVersion, TeamId,
    VersionId,
};

/// Operations available inside one transaction
pub trait StoreTx {
    /// Load a proposal
    fn proposal(&mut self, id: ProposalId) -> StoreResult<Option<Proposal>>;

    /// Insert a proposal
    ///
    /// Fails with `Conflict` when the team already owns an active proposal.
    fn insert_proposal(&mut self, proposal: &Proposal) -> StoreResult<()>;

    /// Overwrite a proposal row
    fn update_proposal(&mut self, proposal: &Proposal) -> StoreResult<()>;

    /// Physically delete a proposal with its versions and decisions
    fn delete_proposal(&mut self, id: ProposalId) -> StoreResult<bool>;

    /// The team's active (non-terminal, non-archived) proposal, if any
    fn active_proposal_for_team(&mut self, team_id: TeamId) -> StoreResult<Option<ProposalId>>;

    /// Proposals matching `filter`, newest first
    fn proposals(&mut self, filter: &ProposalFilter) -> StoreResult<Vec<Proposal>>;

    /// Load a version
    fn version(&mut self, id: VersionId) -> StoreResult<Option<ProposalVersion>>;

    /// Load a version by its number
    fn version_by_number(
        &mut self,
        proposal_id: ProposalId,
        number: u32,
    ) -> StoreResult<Option<ProposalVersion>>;

    /// Highest version number of a proposal
    fn latest_version_number(&mut self, proposal_id: ProposalId) -> StoreResult<Option<u32>>;

    /// Insert a version
    ///
    /// Fails with `Conflict` when `(proposal_id, version_number)` is taken.
    fn insert_version(&mut self, version: &ProposalVersion) -> StoreResult<()>;

    /// Overwrite a version row
    fn update_version(&mut self, version: &ProposalVersion) -> StoreResult<()>;

    /// All versions of a proposal, newest first
    fn versions(&mut self, proposal_id: ProposalId) -> StoreResult<Vec<ProposalVersion>>;

    /// Append a decision
    fn insert_decision(&mut self, decision: &Decision) -> StoreResult<()>;

    /// Decisions on a proposal in the order they were recorded
    fn decisions(&mut self, proposal_id: ProposalId) -> StoreResult<Vec<Decision>>;

    /// Insert the derived project
    ///
    /// Fails with `Conflict` when the proposal already has one.
    fn insert_project(&mut self, record: &DerivedRecord) -> StoreResult<()>;

    /// Overwrite a derived project row
    fn update_project(&mut self, record: &DerivedRecord) -> StoreResult<()>;

    /// Derived project of a proposal
    fn project_for_proposal(&mut self, proposal_id: ProposalId)
        -> StoreResult<Option<DerivedRecord>>;
}

/// A transactional datastore
#[async_trait]
pub trait Datastore: Send + Sync + 'static {
    /// Run `work` atomically
    ///
    /// Nothing `work` wrote is visible to anyone unless it returns `Ok` and
    /// the commit succeeds. Backend failures are converted into `E`.
    async fn transact<F, R, E>(&self, work: F) -> Result<R, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<R, E> + Send + 'static,
        R: Send + 'static,
        E: From<StoreError> + Send + 'static;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}
