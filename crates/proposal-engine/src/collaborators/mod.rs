//! External collaborators
//!
//! The engine consumes team membership, file storage, audit, notification
//! and advisory analysis through these narrow traits. Reference in-memory
//! implementations live in [`memory`].

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use proposal_core::{DecisionKind, DepartmentId, FileDescriptor, ProposalContent, ProposalId, TeamId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Failure inside an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// Service could not be reached or timed out
    #[error("{service} unavailable: {message}")]
    Unavailable {
        /// Collaborator name
        service: &'static str,
        /// Failure detail
        message: String,
    },

    /// Service refused the request
    #[error("{service} rejected the request: {reason}")]
    Rejected {
        /// Collaborator name
        service: &'static str,
        /// Why
        reason: String,
    },
}

impl CollaboratorError {
    /// Unavailable helper
    #[inline]
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    /// Rejected helper
    #[inline]
    pub fn rejected(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Role granted by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Team member or leader
    Student,
    /// Academic supervisor, usually the assigned reviewer
    Supervisor,
    /// Head of a department
    DepartmentHead,
    /// Platform administrator
    Admin,
}

/// Authenticated caller, trusted input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Who
    pub user_id: UserId,
    /// Granted role
    pub role: Role,
    /// Department the actor belongs to
    pub department_id: Option<DepartmentId>,
}

impl Actor {
    /// Create an actor without a department
    #[inline]
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            department_id: None,
        }
    }

    /// With department
    #[inline]
    #[must_use]
    pub fn in_department(mut self, department_id: impl Into<DepartmentId>) -> Self {
        self.department_id = Some(department_id.into());
        self
    }

    /// Platform administrator
    #[inline]
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Department head of exactly `department`
    #[must_use]
    pub fn heads(&self, department: Option<DepartmentId>) -> bool {
        self.role == Role::DepartmentHead
            && department.is_some()
            && self.department_id == department
    }
}

// =============================================================================
// Team directory
// =============================================================================

/// Team as reported by the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamInfo {
    /// Team identifier
    pub team_id: TeamId,
    /// Only the leader may author and submit
    pub leader_id: UserId,
    /// Submission requires a finalized roster
    pub is_finalized: bool,
    /// Members other than the leader
    pub member_ids: Vec<UserId>,
    /// Owning department
    pub department_id: Option<DepartmentId>,
}

impl TeamInfo {
    /// Leader or member
    #[must_use]
    pub fn includes(&self, user_id: UserId) -> bool {
        self.leader_id == user_id || self.member_ids.contains(&user_id)
    }
}

/// Team membership and leadership
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TeamDirectory: Send + Sync {
    /// Look up a team; `None` if it does not exist
    async fn get_team(&self, team_id: TeamId) -> Result<Option<TeamInfo>, CollaboratorError>;
}

// =============================================================================
// File storage
// =============================================================================

/// Content-addressed file storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist `bytes` and describe where they went
    async fn store(&self, file_name: &str, bytes: &[u8])
        -> Result<FileDescriptor, CollaboratorError>;
}

// =============================================================================
// Audit
// =============================================================================

/// One audit log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// `proposal`, `version`, `decision` or `project`
    pub entity_type: String,
    /// Identifier of the entity
    pub entity_id: String,
    /// Dotted action name, e.g. `proposal.submitted`
    pub action: String,
    /// Who did it
    pub actor_id: UserId,
    /// State before
    pub old_state: Option<String>,
    /// State after
    pub new_state: Option<String>,
    /// Free-form detail
    pub context: serde_json::Value,
    /// When
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    /// Entry without state change or context
    #[must_use]
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl ToString,
        action: impl Into<String>,
        actor_id: UserId,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            action: action.into(),
            actor_id,
            old_state: None,
            new_state: None,
            context: serde_json::Value::Null,
            at: Utc::now(),
        }
    }

    /// With state change
    #[must_use]
    pub fn with_states(mut self, old: impl ToString, new: impl ToString) -> Self {
        self.old_state = Some(old.to_string());
        self.new_state = Some(new.to_string());
        self
    }

    /// With context
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Append-only audit trail
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Record one entry
    async fn record(&self, entry: AuditEntry) -> Result<(), CollaboratorError>;
}

// =============================================================================
// Notifications
// =============================================================================

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event", content = "kind")]
pub enum NotificationEvent {
    /// A reviewer was assigned
    ReviewerAssigned,
    /// Proposal submitted for review
    Submitted,
    /// Reviewer recorded a verdict
    Decided(DecisionKind),
}

/// Message for one or more users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Who should hear about it
    pub recipients: Vec<UserId>,
    /// Proposal concerned
    pub proposal_id: ProposalId,
    /// Event
    pub event: NotificationEvent,
}

/// Notification delivery
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification
    async fn notify(&self, notification: Notification) -> Result<(), CollaboratorError>;
}

// =============================================================================
// Advisory analysis
// =============================================================================

/// Non-binding feedback on proposal content; never persisted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryReport {
    /// Rough completeness score in `[0, 1]`
    pub score: f32,
    /// Human-readable remarks
    pub remarks: Vec<String>,
}

/// Advisory text analysis
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdvisoryAnalyzer: Send + Sync {
    /// Analyze one content snapshot
    async fn analyze(&self, content: &ProposalContent) -> Result<AdvisoryReport, CollaboratorError>;
}

// =============================================================================
// Bundle
// =============================================================================

/// Everything the lifecycle service talks to besides the datastore
#[derive(Clone)]
pub struct Collaborators {
    /// Team directory
    pub teams: Arc<dyn TeamDirectory>,
    /// File storage
    pub files: Arc<dyn FileStore>,
    /// Audit sink
    pub audit: Arc<dyn AuditSink>,
    /// Notification delivery
    pub notifier: Arc<dyn Notifier>,
    /// Optional advisory analysis
    pub advisory: Option<Arc<dyn AdvisoryAnalyzer>>,
}

impl Collaborators {
    /// Bundle the required collaborators
    #[must_use]
    pub fn new(
        teams: Arc<dyn TeamDirectory>,
        files: Arc<dyn FileStore>,
        audit: Arc<dyn AuditSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            teams,
            files,
            audit,
            notifier,
            advisory: None,
        }
    }

    /// With advisory analysis
    #[must_use]
    pub fn with_advisory(mut self, advisory: Arc<dyn AdvisoryAnalyzer>) -> Self {
        self.advisory = Some(advisory);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("advisory", &self.advisory.is_some())
            .finish_non_exhaustive()
    }
}
