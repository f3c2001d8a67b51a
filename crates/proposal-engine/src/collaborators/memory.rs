//! In-memory collaborators for tests and the demo binary

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use proposal_core::{FileDescriptor, ProposalContent, TeamId};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{
    AdvisoryAnalyzer, AdvisoryReport, AuditEntry, AuditSink, CollaboratorError, FileStore,
    Notification, Notifier, TeamDirectory, TeamInfo,
};

/// Team directory backed by a concurrent map
#[derive(Debug, Default)]
pub struct StaticTeamDirectory {
    teams: DashMap<TeamId, TeamInfo>,
}

impl StaticTeamDirectory {
    /// Empty directory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a team
    pub fn insert(&self, team: TeamInfo) {
        self.teams.insert(team.team_id, team);
    }

    /// Mark a team's roster final; `false` if the team is unknown
    pub fn finalize(&self, team_id: TeamId) -> bool {
        match self.teams.get_mut(&team_id) {
            Some(mut team) => {
                team.is_finalized = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl TeamDirectory for StaticTeamDirectory {
    async fn get_team(&self, team_id: TeamId) -> Result<Option<TeamInfo>, CollaboratorError> {
        Ok(self.teams.get(&team_id).map(|team| team.clone()))
    }
}

/// Content-addressed file store kept in memory
#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl InMemoryFileStore {
    /// Empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes previously stored under `url`
    #[must_use]
    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.blobs.get(url).map(|blob| blob.clone())
    }

    /// Number of stored blobs
    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    /// No blobs stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<FileDescriptor, CollaboratorError> {
        let sha256 = hex::encode(Sha256::digest(bytes));
        let url = format!("mem://files/{sha256}/{file_name}");
        let byte_size = u64::try_from(bytes.len())
            .map_err(|_| CollaboratorError::rejected("file store", "file too large"))?;

        self.blobs.insert(url.clone(), bytes.to_vec());
        debug!(%url, byte_size, "stored file");
        Ok(FileDescriptor {
            url,
            sha256,
            byte_size,
        })
    }
}

/// Audit sink that keeps every entry
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditSink {
    /// Empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded entries
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Recorded action names in order
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.action.clone()).collect()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), CollaboratorError> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

/// Notifier that logs and keeps every notification
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Empty notifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of sent notifications
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError> {
        info!(
            proposal = %notification.proposal_id,
            event = ?notification.event,
            recipients = notification.recipients.len(),
            "notification"
        );
        self.sent.lock().push(notification);
        Ok(())
    }
}

/// Advisory analyzer that only checks which sections are filled in
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessAnalyzer;

#[async_trait]
impl AdvisoryAnalyzer for CompletenessAnalyzer {
    async fn analyze(&self, content: &ProposalContent) -> Result<AdvisoryReport, CollaboratorError> {
        let sections = [
            ("objectives", &content.objectives),
            ("methodology", &content.methodology),
            ("timeline", &content.timeline),
            ("expected outcomes", &content.expected_outcomes),
        ];
        let remarks: Vec<String> = sections
            .iter()
            .filter(|(_, text)| text.trim().is_empty())
            .map(|(name, _)| format!("{name} section is empty"))
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let score = (sections.len() - remarks.len()) as f32 / sections.len() as f32;
        Ok(AdvisoryReport { score, remarks })
    }
}
