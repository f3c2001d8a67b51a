//! Version Store
//!
//! Append-only sequence of content snapshots per proposal. Every method runs
//! against a [`StoreTx`], so it joins whatever transaction the caller opened.
//! Next version numbers are read inside that transaction and backed by the
//! datastore's `(proposal, number)` uniqueness, never by an in-process
//! counter.

use chrono::{DateTime, Utc};
use proposal_core::{
    ProposalContent, ProposalId, ProposalStatus, ProposalVersion, UserId, VersionId,
};
use proposal_store::{StoreError, StoreTx};

use crate::error::{EntityKind, LifecycleError, LifecycleResult};

/// Version operations bound to one open transaction
pub struct VersionStore<'a> {
    tx: &'a mut dyn StoreTx,
}

impl<'a> VersionStore<'a> {
    /// Wrap a transaction handle
    #[inline]
    pub fn new(tx: &'a mut dyn StoreTx) -> Self {
        Self { tx }
    }

    /// Create version 1
    ///
    /// # Errors
    /// `Conflict` if version 1 already exists
    pub fn create_initial_version(
        &mut self,
        proposal_id: ProposalId,
        content: ProposalContent,
        author: UserId,
        at: DateTime<Utc>,
    ) -> LifecycleResult<ProposalVersion> {
        if self.tx.version_by_number(proposal_id, 1)?.is_some() {
            return Err(LifecycleError::Conflict("version 1 already exists".into()));
        }
        let version = ProposalVersion::new(proposal_id, 1, content, author, at);
        self.insert(&version)?;
        Ok(version)
    }

    /// Overwrite version 1 in place
    ///
    /// # Errors
    /// - `NotFound` if the proposal or its first version is missing
    /// - `InvalidState` unless the proposal is in `draft` and version 1 is
    ///   still unlocked
    pub fn overwrite_draft_version(
        &mut self,
        proposal_id: ProposalId,
        content: ProposalContent,
    ) -> LifecycleResult<ProposalVersion> {
        let proposal = self
            .tx
            .proposal(proposal_id)?
            .ok_or(LifecycleError::NotFound(EntityKind::Proposal))?;
        if proposal.status != ProposalStatus::Draft || proposal.was_submitted() {
            return Err(LifecycleError::invalid_state("overwrite content", proposal.status));
        }

        let mut version = self
            .tx
            .version_by_number(proposal_id, 1)?
            .ok_or(LifecycleError::NotFound(EntityKind::Version))?;
        if version.is_locked() {
            return Err(LifecycleError::invalid_state("overwrite content", proposal.status));
        }

        version.content = content;
        self.tx.update_version(&version)?;
        Ok(version)
    }

    /// Insert version N+1 where N is the current maximum
    ///
    /// # Errors
    /// - `NotFound` if the proposal has no version yet
    /// - `Conflict` if another writer took N+1 first
    pub fn append_new_version(
        &mut self,
        proposal_id: ProposalId,
        content: ProposalContent,
        author: UserId,
        at: DateTime<Utc>,
    ) -> LifecycleResult<ProposalVersion> {
        let latest = self
            .tx
            .latest_version_number(proposal_id)?
            .ok_or(LifecycleError::NotFound(EntityKind::Version))?;
        let next = latest
            .checked_add(1)
            .ok_or_else(|| LifecycleError::Precondition("version limit reached".into()))?;

        let version = ProposalVersion::new(proposal_id, next, content, author, at);
        self.insert(&version)?;
        Ok(version)
    }

    /// All versions, newest first
    ///
    /// # Errors
    /// Datastore failures only
    pub fn list_versions(&mut self, proposal_id: ProposalId) -> LifecycleResult<Vec<ProposalVersion>> {
        Ok(self.tx.versions(proposal_id)?)
    }

    /// Highest-numbered version
    ///
    /// # Errors
    /// `NotFound` if the proposal has no version
    pub fn latest_version(&mut self, proposal_id: ProposalId) -> LifecycleResult<ProposalVersion> {
        let number = self
            .tx
            .latest_version_number(proposal_id)?
            .ok_or(LifecycleError::NotFound(EntityKind::Version))?;
        self.tx
            .version_by_number(proposal_id, number)?
            .ok_or(LifecycleError::NotFound(EntityKind::Version))
    }

    /// Freeze a version's content; idempotent
    ///
    /// # Errors
    /// Datastore failures only
    pub fn lock(&mut self, version: &mut ProposalVersion, at: DateTime<Utc>) -> LifecycleResult<()> {
        if version.is_locked() {
            return Ok(());
        }
        version.locked_at = Some(at);
        self.tx.update_version(version)?;
        Ok(())
    }

    /// Flag a version as the approved one
    ///
    /// # Errors
    /// `NotFound` if the version does not exist
    pub fn mark_approved(&mut self, version_id: VersionId) -> LifecycleResult<ProposalVersion> {
        let mut version = self
            .tx
            .version(version_id)?
            .ok_or(LifecycleError::NotFound(EntityKind::Version))?;
        version.is_approved = true;
        self.tx.update_version(&version)?;
        Ok(version)
    }

    fn insert(&mut self, version: &ProposalVersion) -> LifecycleResult<()> {
        self.tx.insert_version(version).map_err(|e| match e {
            StoreError::Conflict(_) => LifecycleError::Conflict(format!(
                "version {} already exists",
                version.version_number
            )),
            other => other.into(),
        })
    }
}
